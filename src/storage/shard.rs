//! Sharded blob access.
//!
//! `Shard` ties the local blob store to the ring: writes land on the
//! identifier's owner (routed if the uploader is not it) and fan out along
//! the successor chain; reads verify the digest locally and fail over
//! through the replica chain when the owner is missing or down.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::chord::{ChordNode, REPLICATION_FACTOR};
use crate::error::ChordError;
use crate::ring::{Finger, id_from_hex};

use super::backend::BlobStore;
use super::integrity::{self, IdentifierAlgorithm};

/// Receipt for a stored blob: its content identifier, the unkeyed SHA-256
/// its replicas are named by, and the ring id of the owning node. The two
/// digests coincide except in HMAC mode.
#[derive(Debug, Clone)]
pub struct StoreReceipt {
    pub content_id: String,
    pub sha256: String,
    pub shard_id: u32,
}

pub struct Shard {
    node: Arc<ChordNode>,
    store: Arc<dyn BlobStore>,
    algorithm: IdentifierAlgorithm,
    secret: Vec<u8>,
    hits: AtomicU64,
}

impl Shard {
    pub fn new(
        node: Arc<ChordNode>,
        store: Arc<dyn BlobStore>,
        algorithm: IdentifierAlgorithm,
        secret: Vec<u8>,
    ) -> Arc<Self> {
        Arc::new(Self {
            node,
            store,
            algorithm,
            secret,
            hits: AtomicU64::new(0),
        })
    }

    /// Number of lookups served since startup.
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Ingest a blob: derive its identifier, place the bytes on the owner
    /// (here or routed to it), and push the replica chain.
    pub async fn save_file(&self, bytes: &[u8]) -> Result<StoreReceipt, ChordError> {
        let content_id = integrity::digest(bytes, self.algorithm, &self.secret);
        let sha256 = if self.algorithm == IdentifierAlgorithm::HmacSha256 {
            integrity::digest(bytes, IdentifierAlgorithm::Sha256, &[])
        } else {
            content_id.clone()
        };
        let Some(identifier) = id_from_hex(&content_id) else {
            return Err(ChordError::Storage(format!(
                "digest {content_id} yields no ring identifier"
            )));
        };

        if self.node.owns_identifier(identifier).await {
            match self.store.put(&content_id, bytes).await {
                Ok(()) => info!("stored {content_id} locally as owner"),
                Err(ChordError::AlreadyStored(_)) => {
                    debug!("{content_id} already present; refreshing replicas")
                }
                Err(e) => return Err(e),
            }
            self.replicate_to_successors(bytes).await;
            return Ok(StoreReceipt {
                content_id,
                sha256,
                shard_id: self.node.local().id,
            });
        }

        let owner = self.node.find_successor(identifier).await?;
        self.node
            .client()
            .open(owner)
            .replicate_file(bytes, (REPLICATION_FACTOR - 1) as u32)
            .await?;
        info!("routed {content_id} to owner {owner}");
        Ok(StoreReceipt {
            content_id,
            sha256,
            shard_id: owner.id,
        })
    }

    /// Push the blob one hop along the successor chain; each receiver
    /// forwards it further until the hop budget runs out. Best effort: a
    /// down successor costs a replica, not the write.
    async fn replicate_to_successors(&self, bytes: &[u8]) {
        if REPLICATION_FACTOR < 2 {
            return;
        }
        let successor = self.node.successor().await;
        if successor == self.node.local() {
            return;
        }
        if let Err(e) = self
            .node
            .client()
            .open(successor)
            .replicate_file(bytes, (REPLICATION_FACTOR - 2) as u32)
            .await
        {
            warn!("failed to replicate to successor {successor}: {e}");
        }
    }

    /// Store a pushed replica and keep forwarding while hops remain.
    ///
    /// Replicas are always named by the plain SHA-256 of the bytes; a
    /// keyed digest cannot be recomputed by other nodes, and the replica
    /// chain trusts its ring peers.
    pub async fn receive_replica(
        &self,
        bytes: Vec<u8>,
        hops_remaining: u32,
    ) -> Result<(), ChordError> {
        let name = integrity::digest(&bytes, IdentifierAlgorithm::Sha256, &[]);
        match self.store.put(&name, &bytes).await {
            Ok(()) => debug!("stored replica {name}"),
            Err(ChordError::AlreadyStored(_)) => debug!("replica {name} already present"),
            Err(e) => return Err(e),
        }

        if hops_remaining == 0 {
            return Ok(());
        }
        let successor = self.node.successor().await;
        if successor == self.node.local() {
            return Ok(());
        }
        if let Err(e) = self
            .node
            .client()
            .open(successor)
            .replicate_file(&bytes, hops_remaining - 1)
            .await
        {
            warn!("failed to forward replica {name} to {successor}: {e}");
        }
        Ok(())
    }

    /// Fetch a blob from the local store only, without verification.
    /// Serves peer replica fetches; the requester verifies.
    pub async fn get_local(&self, content_id: &str) -> Option<Vec<u8>> {
        self.store.get(content_id).await.ok().flatten()
    }

    /// Retrieve a blob by identifier, from the local store when possible,
    /// otherwise from the owner or its replicas.
    pub async fn get_item(&self, content_id: &str) -> Result<Vec<u8>, ChordError> {
        self.hits.fetch_add(1, Ordering::Relaxed);

        if let Some(bytes) = self.store.get(content_id).await? {
            match integrity::verify(&bytes, content_id, self.algorithm, &self.secret) {
                Ok(()) => return Ok(bytes),
                // Local copy is damaged; fall through to the ring.
                Err(e) => warn!("local copy of {content_id} failed verification: {e}"),
            }
        }

        let Some(identifier) = id_from_hex(content_id) else {
            return Err(ChordError::NotFound(content_id.to_string()));
        };
        if self.node.owns_identifier(identifier).await && !self.store.contains(content_id).await {
            // We are the owner and hold nothing: the blob does not exist.
            return Err(ChordError::NotFound(content_id.to_string()));
        }

        self.forward_lookup(identifier, content_id).await
    }

    /// Resolve the identifier's owner and fetch from it, falling back to
    /// successive replicas. Each unreachable peer buys one re-resolution
    /// after a pause long enough for stabilization to reroute around it.
    async fn forward_lookup(
        &self,
        identifier: u32,
        content_id: &str,
    ) -> Result<Vec<u8>, ChordError> {
        let mut replica: Option<Finger> = None;
        let mut last_mismatch: Option<ChordError> = None;
        let mut attempts = REPLICATION_FACTOR;

        while attempts > 0 {
            attempts -= 1;
            let target = match replica {
                None => match self.node.find_successor(identifier).await {
                    Ok(owner) => owner,
                    Err(e) if e.is_unreachable() => {
                        self.pause_for_stabilization(content_id, attempts).await?;
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                Some(prev) => {
                    match self.node.client().open(prev).get_successor().await {
                        Ok(next) => next,
                        Err(_) => {
                            replica = None;
                            self.pause_for_stabilization(content_id, attempts).await?;
                            continue;
                        }
                    }
                }
            };

            if target == self.node.local() {
                // Routing came back to us; only the local store can answer.
                match self.store.get(content_id).await? {
                    Some(bytes) => {
                        match integrity::verify(&bytes, content_id, self.algorithm, &self.secret)
                        {
                            Ok(()) => return Ok(bytes),
                            Err(e) => {
                                warn!("local copy of {content_id} failed verification: {e}");
                                last_mismatch = Some(e);
                                replica = Some(target);
                            }
                        }
                    }
                    None if replica.is_none() => {
                        return Err(ChordError::NotFound(content_id.to_string()));
                    }
                    None => replica = Some(target),
                }
                continue;
            }

            let peer = self.node.client().open(target);
            if peer.get_shard_id().await.is_err() {
                debug!("peer {target} unreachable during lookup of {content_id}");
                replica = None;
                self.pause_for_stabilization(content_id, attempts).await?;
                continue;
            }

            match peer.get_file(content_id).await {
                Ok(Some(bytes)) => {
                    match integrity::verify(&bytes, content_id, self.algorithm, &self.secret) {
                        Ok(()) => {
                            debug!("fetched {content_id} from {target}");
                            return Ok(bytes);
                        }
                        Err(e) => {
                            warn!("copy of {content_id} at {target} failed verification: {e}");
                            last_mismatch = Some(e);
                            replica = Some(target);
                        }
                    }
                }
                Ok(None) if replica.is_none() => {
                    // The resolved owner holds nothing: not stored.
                    return Err(ChordError::NotFound(content_id.to_string()));
                }
                Ok(None) => {
                    debug!("replica {target} holds no copy of {content_id}");
                    replica = Some(target);
                }
                Err(_) => {
                    replica = None;
                    self.pause_for_stabilization(content_id, attempts).await?;
                }
            }
        }

        // A mismatch on every reachable copy means the content existed but
        // is damaged everywhere, which is worth distinguishing from plain
        // exhaustion.
        match last_mismatch {
            Some(e) => Err(e),
            None => Err(ChordError::RetrievalFailed(content_id.to_string())),
        }
    }

    /// Give stabilization time to route around a dead peer before the next
    /// attempt; with no attempts left, fail now instead of sleeping.
    async fn pause_for_stabilization(
        &self,
        content_id: &str,
        attempts_left: usize,
    ) -> Result<(), ChordError> {
        if attempts_left == 0 {
            return Err(ChordError::RetrievalFailed(content_id.to_string()));
        }
        tokio::time::sleep(2 * self.node.stabilize_interval()).await;
        Ok(())
    }
}
