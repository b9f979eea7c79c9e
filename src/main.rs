use std::net::SocketAddr;
use std::sync::Arc;

use rand::RngCore;
use tokio::net::TcpListener;

use chord_shard::chord::{ChordConfig, ChordNode, NodeClient, Stabilizer};
use chord_shard::ring::Finger;
use chord_shard::server::{node_router, spawn_server};
use chord_shard::storage::{BlobStore, DiskStore, IdentifierAlgorithm, MemoryStore, Shard};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port> [--join <addr:port>] [--identifier sha256|sha256-noverify|hmac] [--data-dir <path>] [--random-fingers]",
            args[0]
        );
        eprintln!("Example: {} --bind 127.0.0.1:5000", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:5001 --join 127.0.0.1:5000",
            args[0]
        );
        std::process::exit(1);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut bootstrap: Option<SocketAddr> = None;
    let mut algorithm = IdentifierAlgorithm::Sha256;
    let mut data_dir: Option<String> = None;
    let mut random_fingers = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--join" => {
                bootstrap = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--identifier" => {
                algorithm = IdentifierAlgorithm::parse(&args[i + 1])
                    .ok_or_else(|| anyhow::anyhow!("unknown identifier algorithm"))?;
                i += 2;
            }
            "--data-dir" => {
                data_dir = Some(args[i + 1].clone());
                i += 2;
            }
            "--random-fingers" => {
                random_fingers = true;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.ok_or_else(|| anyhow::anyhow!("--bind is required"))?;
    let local = Finger::from_addr(bind_addr);

    tracing::info!("Starting node {local}");
    match bootstrap {
        Some(addr) => tracing::info!("Joining ring via {addr}"),
        None => tracing::info!("Starting a new ring"),
    }

    let node = ChordNode::new(
        local,
        NodeClient::new(),
        ChordConfig {
            random_finger_update: random_fingers,
            ..ChordConfig::default()
        },
    );

    let store: Arc<dyn BlobStore> = match &data_dir {
        Some(dir) => Arc::new(DiskStore::open(dir).await?),
        None => Arc::new(MemoryStore::new()),
    };

    let mut secret = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    let shard = Shard::new(node.clone(), store, algorithm, secret);

    // Bind and serve before joining so peers can reach this node as soon as
    // it shows up in anyone's pointers.
    let listener = TcpListener::bind(bind_addr).await?;
    let server = spawn_server(listener, node_router(node.clone(), shard));

    match bootstrap {
        Some(addr) => node.join(Finger::from_addr(addr), false).await?,
        None => node.join(local, true).await?,
    }

    let stabilizer = Stabilizer::start(node.clone());

    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down; leaving the ring");
    stabilizer.cancel().await;
    server.abort();

    Ok(())
}
