//! Ring identifier arithmetic.

use std::net::{IpAddr, SocketAddr};

/// Number of bits in a ring identifier, and therefore the number of finger
/// table slots. The ring holds 2^32 positions.
pub const NUM_FINGERS: usize = 32;

/// Knuth's multiplicative hash over the full 32-bit space.
///
/// A one-to-one remap, so distinct inputs never collide; its only job is to
/// spread sequential inputs uniformly around the ring.
pub fn int_hash(input: u32) -> u32 {
    input.wrapping_mul(2_654_435_761)
}

/// Map a socket address onto the ring.
///
/// The port participates in the hash so that several nodes on one host get
/// distinct ring ids.
pub fn hash_address(addr: &SocketAddr) -> u32 {
    let folded = match addr.ip() {
        IpAddr::V4(ip) => u32::from(ip),
        IpAddr::V6(ip) => ip
            .octets()
            .chunks(4)
            .fold(0u32, |acc, chunk| {
                acc ^ u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
            }),
    };
    int_hash(folded ^ u32::from(addr.port()))
}

/// Ring identifier for a content digest: the first 8 hex characters parsed
/// as a `u32`. Returns `None` for ids too short or not hexadecimal.
pub fn id_from_hex(digest: &str) -> Option<u32> {
    let prefix = digest.get(0..8)?;
    u32::from_str_radix(prefix, 16).ok()
}

/// Wrap-aware half-open interval test: is `id` in `[start, end)` on the ring?
///
/// When `start >= end` the interval wraps through zero; `start == end`
/// covers the full ring, which is what makes a single-node ring own every
/// identifier.
pub fn within_interval(id: u32, start: u32, end: u32) -> bool {
    if start < end {
        start <= id && id < end
    } else {
        id >= start || id < end
    }
}

/// Identifier targeted by finger-table slot `index`: `base + 2^(index-1)`.
/// Slot 0 is the direct successor and is maintained by stabilization, so
/// callers refresh slots `1..NUM_FINGERS`.
pub fn finger_target(base: u32, index: u32) -> u32 {
    base.wrapping_add(1u32 << (index - 1))
}
