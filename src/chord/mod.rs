//! Chord ring membership and routing.
//!
//! `node` holds the protocol logic, `remote` the HTTP proxy for peers,
//! `protocol` the wire format, `handlers` the inbound HTTP surface, and
//! `stabilizer` the periodic maintenance task.

pub mod handlers;
pub mod node;
pub mod protocol;
pub mod remote;
pub mod stabilizer;

pub use node::{ChordConfig, ChordNode, REPLICATION_FACTOR, STABILIZE_INTERVAL};
pub use remote::{NodeClient, RemoteNode};
pub use stabilizer::Stabilizer;

#[cfg(test)]
mod tests;
