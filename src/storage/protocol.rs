//! Client-facing storage API surface.
//!
//! Blob ingestion and retrieval for external callers; the ring-internal
//! replication endpoints live with the chord protocol.

use serde::{Deserialize, Serialize};

/// POST here with raw bytes to store a blob; GET `/shard/{content_id}` to
/// fetch it back.
pub const ENDPOINT_SHARD: &str = "/shard";

/// Receipt returned for a stored blob. `sha256` is the unkeyed digest the
/// replica chain stores the bytes under; it equals `content_id` except in
/// HMAC mode.
#[derive(Debug, Serialize, Deserialize)]
pub struct InsertResponse {
    pub content_id: String,
    pub sha256: String,
    pub shard_id: u32,
}

/// Error body for failed storage operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Per-instance counters, served at `GET /shard/stats`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub shard_id: u32,
    pub hits: u64,
}
