//! Ground-truth oracles (component H): pure functions recomputing "who
//! should own this key" directly from a node id set, independent of any
//! protocol's own routing state.
//!
//! These exist only so tests can check a protocol's `lookup` result
//! against the answer the protocol *should* have found, given perfect
//! knowledge of the network. They are never called from `join`,
//! `leave`, `stabilize`, or any other protocol-internal path.

use overlay_tools::OverlayId;

/// RING semantics: the key's successor is the first live id at or past
/// `key` going clockwise, wrapping to the smallest id if none is.
///
/// Panics if `node_ids` is empty; there is no well-defined answer on an
/// empty ring and callers must not ask.
pub fn ring_ground_truth(key: OverlayId, node_ids: &[OverlayId]) -> OverlayId {
    assert!(!node_ids.is_empty(), "ring_ground_truth requires at least one node");
    node_ids
        .iter()
        .copied()
        .filter(|&id| id >= key)
        .min()
        .unwrap_or_else(|| *node_ids.iter().min().unwrap())
}

/// XOR semantics: the id minimizing `id XOR key`.
///
/// Panics on an empty `node_ids`, matching [`ring_ground_truth`].
pub fn xor_ground_truth(key: OverlayId, node_ids: &[OverlayId]) -> OverlayId {
    assert!(!node_ids.is_empty(), "xor_ground_truth requires at least one node");
    node_ids
        .iter()
        .copied()
        .min_by_key(|&id| id ^ key)
        .unwrap()
}

/// Circular distance on a ring of size `2^m`: the shorter of the two
/// arcs between `a` and `b`.
fn circular_distance(a: OverlayId, b: OverlayId, m: u32) -> u64 {
    let id_space = if m >= 64 { u64::MAX } else { 1u64 << m };
    let diff = if a > b { a - b } else { b - a };
    diff.min(id_space - diff)
}

/// PREFIX semantics: the id minimizing `(circular_distance(id, key), id)`
/// — ties broken by the smaller id, matching the reference tie-break.
///
/// Panics on an empty `node_ids`, matching [`ring_ground_truth`].
pub fn prefix_ground_truth(key: OverlayId, node_ids: &[OverlayId], m: u32) -> OverlayId {
    assert!(!node_ids.is_empty(), "prefix_ground_truth requires at least one node");
    node_ids
        .iter()
        .copied()
        .min_by_key(|&id| (circular_distance(id, key, m), id))
        .unwrap()
}
