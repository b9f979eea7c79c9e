//! Identifier Space Module
//!
//! Maps node addresses and content digests onto a fixed ring of 2^32
//! positions and provides the wrap-aware interval tests that every
//! ownership and routing decision is built on.
//!
//! ## Core Concepts
//! - **Ring ids**: `u32` values produced by a one-to-one multiplicative hash,
//!   so sequential addresses do not cluster on the ring.
//! - **Intervals**: all comparisons use one half-open, wrap-aware convention;
//!   a node owns exactly the identifiers in `(predecessor, self]`.
//! - **Fingers**: immutable `{address, id}` identities exchanged between
//!   nodes as routing entries.

pub mod id;
pub mod types;

pub use id::{NUM_FINGERS, finger_target, hash_address, id_from_hex, int_hash, within_interval};
pub use types::Finger;
