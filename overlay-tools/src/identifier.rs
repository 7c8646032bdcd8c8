use sha1::{Digest, Sha1};
use std::collections::BTreeSet;

/// An identifier in the modular ring `[0, 2^m)`. Node ids and keys are
/// both members of this same space; which is which is a matter of how
/// a caller uses the value, not of the type.
pub type OverlayId = u64;

/// `hash_key(s, m) = int(SHA1(utf8(s)), 16) mod 2^m`.
///
/// Only the low `m` bits of the 160-bit digest matter, since reducing
/// modulo a power of two discards everything above bit `m - 1`
/// regardless of how large the hashed value is. `m` must fit in a
/// `u64` (`m <= 64`); every scenario in this crate uses the default of
/// 16.
pub fn hash_key(s: &str, m: u32) -> OverlayId {
    debug_assert!((1..=64).contains(&m), "id space width out of range: {m}");
    let digest = Sha1::digest(s.as_bytes());
    let low8: [u8; 8] = digest[12..20].try_into().expect("sha1 digest is 20 bytes");
    let value = u64::from_be_bytes(low8);
    let masked = if m >= 64 { value } else { value & ((1u64 << m) - 1) };

    cfg_if::cfg_if! {
        if #[cfg(feature = "tracing")] {
            tracing::trace!(s, m, id = masked, "hashed identifier");
        }
    }

    masked
}

/// Generate `count` well-distributed, deterministic node ids.
///
/// Pure function of `(count, m, seed)`: hashes `"node-{seed}-{i}"` for
/// increasing `i` until `count` distinct ids have been collected, then
/// returns them sorted ascending. Matches the reference generator bit
/// for bit, so the same `(count, m, seed)` produces the same sequence
/// across runs and across implementations.
pub fn generate_node_ids(count: usize, m: u32, seed: u64) -> Vec<OverlayId> {
    generate_ids(count, m, seed, "node")
}

/// Generate `count` deterministic test keys. Same scheme as
/// [`generate_node_ids`] with the `"key-"` prefix.
pub fn generate_keys(count: usize, m: u32, seed: u64) -> Vec<OverlayId> {
    generate_ids(count, m, seed, "key")
}

fn generate_ids(count: usize, m: u32, seed: u64, prefix: &str) -> Vec<OverlayId> {
    let mut ids: BTreeSet<OverlayId> = BTreeSet::new();
    let mut i: u64 = 0;
    while ids.len() < count {
        let candidate = hash_key(&format!("{prefix}-{seed}-{i}"), m);
        ids.insert(candidate);
        i += 1;
    }
    ids.into_iter().take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_key_is_referentially_transparent() {
        let a = hash_key("node-42-0", 16);
        let b = hash_key("node-42-0", 16);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_key_respects_id_space_width() {
        for m in [1u32, 4, 8, 16, 32, 63, 64] {
            let v = hash_key("some-arbitrary-string", m);
            if m < 64 {
                assert!(v < (1u64 << m), "m={m} v={v}");
            }
        }
    }

    #[test]
    fn generators_are_deterministic_and_ascending() {
        let a = generate_node_ids(8, 16, 42);
        let b = generate_node_ids(8, 16, 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn node_and_key_generators_diverge() {
        let nodes = generate_node_ids(10, 16, 42);
        let keys = generate_keys(10, 16, 123);
        assert_ne!(nodes, keys);
    }

    #[test]
    fn generator_count_is_exact() {
        for count in [1usize, 5, 17, 64] {
            let ids = generate_node_ids(count, 16, 42);
            assert_eq!(ids.len(), count);
            let dedup: BTreeSet<_> = ids.iter().collect();
            assert_eq!(dedup.len(), count);
        }
    }
}
