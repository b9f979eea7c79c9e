//! Chord Network Protocol
//!
//! Defines the API endpoints and Data Transfer Objects (DTOs) used for the
//! node-to-node ring operations (routing queries, pointer updates,
//! replication pushes).
//!
//! These structures are serialized as JSON and sent over HTTP; blob payloads
//! travel hex-encoded inside the JSON body.

use serde::{Deserialize, Serialize};

use crate::ring::Finger;

// --- API Endpoints ---

/// Returns this node's own finger; doubles as the liveness probe.
pub const ENDPOINT_LOCATION: &str = "/chord/location";
/// Returns this node's ring id.
pub const ENDPOINT_SHARD_ID: &str = "/chord/shard-id";
/// Returns the direct successor pointer.
pub const ENDPOINT_SUCCESSOR: &str = "/chord/successor";
/// GET returns the predecessor pointer; PUT overwrites it (used by leave).
pub const ENDPOINT_PREDECESSOR: &str = "/chord/predecessor";
/// Offers the sender as a predecessor candidate during stabilization.
pub const ENDPOINT_NOTIFY: &str = "/chord/notify";
/// Resolves the node owning an identifier.
pub const ENDPOINT_FIND_SUCCESSOR: &str = "/chord/find-successor";
/// Resolves the node preceding an identifier's owner.
pub const ENDPOINT_FIND_PREDECESSOR: &str = "/chord/find-predecessor";
/// One routing hop: the remote node's best finger before an identifier.
pub const ENDPOINT_CLOSEST_PRECEDING: &str = "/chord/closest-preceding-finger";
/// Full finger table; fetched during the join-time ring integrity check.
pub const ENDPOINT_FINGER_TABLE: &str = "/chord/finger-table";
/// Asks a node to rebuild its successor list and propagate the request.
pub const ENDPOINT_REFRESH_SUCCESSORS: &str = "/chord/refresh-successors";
/// Replaces a departing node's finger entry, propagating to predecessors.
pub const ENDPOINT_REMOVE_NODE: &str = "/chord/remove-node";
/// Pushes a blob copy one hop along the successor chain.
pub const ENDPOINT_REPLICATE: &str = "/chord/replicate";
/// Direct blob fetch from a node believed to hold a copy.
pub const ENDPOINT_FILE: &str = "/chord/file";

// --- Data Transfer Objects ---

/// A single finger, returned by location/successor/routing queries.
#[derive(Debug, Serialize, Deserialize)]
pub struct FingerResponse {
    pub finger: Finger,
}

/// A finger that may be absent: predecessors start unset, and routing
/// queries answer `None` when they fail.
#[derive(Debug, Serialize, Deserialize)]
pub struct OptionalFingerResponse {
    pub finger: Option<Finger>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShardIdResponse {
    pub shard_id: u32,
}

/// Routing query for the owner of `identifier`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FindRequest {
    pub identifier: u32,
}

/// Stabilization offer: "consider me your predecessor".
#[derive(Debug, Serialize, Deserialize)]
pub struct NotifyRequest {
    pub candidate: Finger,
}

/// Direct predecessor overwrite, sent by a leaving node to its successor.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetPredecessorRequest {
    pub predecessor: Finger,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FingerTableResponse {
    pub fingers: Vec<Finger>,
}

/// Successor-list rebuild request. `nodes_left` bounds how many predecessor
/// hops the request is propagated through, so the chain always terminates.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshSuccessorsRequest {
    pub nodes_left: u32,
}

/// Finger replacement for a node leaving the ring.
///
/// `hops_remaining` bounds the predecessor-ward propagation independently of
/// ring size or topology errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveNodeRequest {
    pub node: Finger,
    pub index: usize,
    pub replacement: Finger,
    pub hops_remaining: u32,
}

/// Replication push. The receiver stores the bytes and, while
/// `hops_remaining` is positive, forwards them to its own successor with the
/// counter decremented.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicateFileRequest {
    pub data_hex: String,
    pub hops_remaining: u32,
}

/// Blob fetch response; `None` with a 404 status means the node holds no copy.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileResponse {
    pub data_hex: Option<String>,
}

/// Standard acknowledgment for pointer-update operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}
