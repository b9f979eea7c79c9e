//! HTTP surface of one node: the ring protocol plus the client storage API
//! on a single listener.

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::chord::handlers as chord_handlers;
use crate::chord::node::ChordNode;
use crate::chord::protocol::*;
use crate::storage::handlers as storage_handlers;
use crate::storage::protocol::ENDPOINT_SHARD;
use crate::storage::shard::Shard;

pub fn node_router(node: Arc<ChordNode>, shard: Arc<Shard>) -> Router {
    Router::new()
        .route(ENDPOINT_LOCATION, get(chord_handlers::handle_get_location))
        .route(ENDPOINT_SHARD_ID, get(chord_handlers::handle_get_shard_id))
        .route(ENDPOINT_SUCCESSOR, get(chord_handlers::handle_get_successor))
        .route(
            ENDPOINT_PREDECESSOR,
            get(chord_handlers::handle_get_predecessor)
                .put(chord_handlers::handle_set_predecessor),
        )
        .route(ENDPOINT_NOTIFY, post(chord_handlers::handle_notify))
        .route(
            ENDPOINT_FIND_SUCCESSOR,
            post(chord_handlers::handle_find_successor),
        )
        .route(
            ENDPOINT_FIND_PREDECESSOR,
            post(chord_handlers::handle_find_predecessor),
        )
        .route(
            ENDPOINT_CLOSEST_PRECEDING,
            post(chord_handlers::handle_closest_preceding_finger),
        )
        .route(
            ENDPOINT_FINGER_TABLE,
            get(chord_handlers::handle_get_finger_table),
        )
        .route(
            ENDPOINT_REFRESH_SUCCESSORS,
            post(chord_handlers::handle_refresh_successors),
        )
        .route(ENDPOINT_REMOVE_NODE, post(chord_handlers::handle_remove_node))
        .route(ENDPOINT_REPLICATE, post(chord_handlers::handle_replicate))
        .route(
            &format!("{ENDPOINT_FILE}/:content_id"),
            get(chord_handlers::handle_get_file),
        )
        .route(ENDPOINT_SHARD, post(storage_handlers::handle_insert_item))
        .route(
            &format!("{ENDPOINT_SHARD}/stats"),
            get(storage_handlers::handle_get_stats),
        )
        .route(
            &format!("{ENDPOINT_SHARD}/:content_id"),
            get(storage_handlers::handle_get_item),
        )
        .layer(Extension(node))
        .layer(Extension(shard))
}

/// Serve the node's router on an already-bound listener. Binding happens
/// before join so the node can answer peers the moment it is visible.
pub fn spawn_server(listener: TcpListener, router: Router) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(async move {
        if let Ok(addr) = listener.local_addr() {
            info!("HTTP server listening on {addr}");
        }
        axum::serve(listener, router).await
    })
}
