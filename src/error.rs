//! Error types shared across the ring protocol and storage layers.

use std::net::SocketAddr;

/// Errors surfaced by ring maintenance, routing and content storage.
///
/// `PeerUnreachable` is deliberately distinct from every protocol-level
/// outcome: callers retry around it (hop fallback, successor failover),
/// while `RingInconsistency` and `Isolated` are never retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChordError {
    /// A remote call timed out or the connection failed.
    #[error("peer {0} is unreachable")]
    PeerUnreachable(SocketAddr),

    /// The join-time ring walk could not locate every expected node.
    #[error("ring integrity check failed during join")]
    RingInconsistency,

    /// The digest recomputed from stored bytes does not match the requested id.
    #[error("digest mismatch: requested {expected}, computed {computed}")]
    SignatureMismatch { expected: String, computed: String },

    /// Content is absent at a reachable node that owns its identifier.
    #[error("content {0} not found")]
    NotFound(String),

    /// No successor-list entry responds; the node must leave the ring.
    #[error("no reachable successor; node is isolated")]
    Isolated,

    /// Every replica was tried and none produced verified bytes.
    #[error("content {0} could not be retrieved from any replica")]
    RetrievalFailed(String),

    /// The blob store already holds content under this key.
    #[error("content {0} is already stored")]
    AlreadyStored(String),

    /// The blob store rejected the operation.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChordError {
    /// True for transport failures that the caller may retry around.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ChordError::PeerUnreachable(_))
    }
}
