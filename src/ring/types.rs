use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

use super::id::hash_address;

/// Identity of one node on the ring: its network address plus ring id.
///
/// Fingers are immutable once constructed and are what nodes exchange as
/// routing entries; they carry no connection state, only identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finger {
    pub addr: SocketAddr,
    pub id: u32,
}

impl Finger {
    /// Derive the ring id from the address.
    pub fn from_addr(addr: SocketAddr) -> Self {
        Self {
            addr,
            id: hash_address(&addr),
        }
    }

    /// Build a finger with a caller-chosen ring id. Topology tests use this
    /// to lay out exact rings.
    pub fn with_id(addr: SocketAddr, id: u32) -> Self {
        Self { addr, id }
    }
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}@{}", self.id, self.addr)
    }
}
