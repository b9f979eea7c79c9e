//! Content-addressed blob storage, sharded across the ring.
//!
//! Blobs are named by the hex digest of their bytes and live on the ring
//! node owning the digest's leading 32 bits, with copies pushed along the
//! successor chain. Retrieval verifies the digest and fails over through
//! the replicas.

pub mod backend;
pub mod handlers;
pub mod integrity;
pub mod protocol;
pub mod shard;

pub use backend::{BlobStore, DiskStore, MemoryStore};
pub use integrity::IdentifierAlgorithm;
pub use shard::{Shard, StoreReceipt};
