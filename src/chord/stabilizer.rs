//! Background stabilization task.
//!
//! Runs one `stabilize` plus one `fix_fingers` round per tick. A failed
//! round is logged and retried next tick; only `Isolated` is fatal, in
//! which case the node leaves the ring and the process exits rather than
//! keep answering queries with stale pointers.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use crate::error::ChordError;

use super::node::ChordNode;

pub struct Stabilizer {
    node: Arc<ChordNode>,
    handle: JoinHandle<()>,
}

impl Stabilizer {
    pub fn start(node: Arc<ChordNode>) -> Self {
        let task_node = node.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(task_node.stabilize_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match task_node.stabilize().await {
                    Ok(()) => debug!("stabilization round complete"),
                    Err(ChordError::Isolated) => {
                        error!("node isolated from the ring; shutting down");
                        task_node.leave().await;
                        std::process::exit(1);
                    }
                    Err(e) => error!("stabilization round failed: {e}"),
                }
                task_node.fix_fingers().await;
            }
        });
        Self { node, handle }
    }

    /// Stop the periodic task, then leave the ring gracefully.
    pub async fn cancel(self) {
        self.handle.abort();
        self.node.leave().await;
    }
}
