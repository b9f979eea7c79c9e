//! Content-addressed file storage sharded across a Chord ring.
//!
//! Every node runs the same binary: an HTTP server carrying both the
//! ring maintenance protocol and the client storage API, plus a background
//! stabilization task that keeps the routing state converging under churn.

pub mod chord;
pub mod error;
pub mod ring;
pub mod server;
pub mod storage;

pub use error::ChordError;
