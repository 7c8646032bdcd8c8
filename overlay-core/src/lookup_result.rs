//! The lookup record (component C): an immutable result value shared
//! by all three protocols.

use overlay_tools::OverlayId;
use serde::{Deserialize, Serialize};

/// Result of resolving a key to its responsible node.
///
/// `path` always begins with the initiator's id and grows by one id
/// per forwarding step for RING/PREFIX, or one id per peer contacted
/// within a round for XOR. `hop_count` is `len(path) - 1` for
/// RING/PREFIX (one hop per intermediate) and the number of query
/// *rounds* for XOR (a round may contact up to alpha peers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub key: OverlayId,
    pub responsible_node: OverlayId,
    pub hop_count: u32,
    pub path: Vec<OverlayId>,
    pub success: bool,
}

impl LookupResult {
    pub fn ok(key: OverlayId, responsible_node: OverlayId, hop_count: u32, path: Vec<OverlayId>) -> Self {
        Self {
            key,
            responsible_node,
            hop_count,
            path,
            success: true,
        }
    }

    /// A failed lookup still carries a `responsible_node` — the best
    /// guess at hop-cap time — so callers that ignore `success` don't
    /// get nonsense, but `success=false` means it must not be trusted.
    pub fn failed(key: OverlayId, responsible_node: OverlayId, hop_count: u32, path: Vec<OverlayId>) -> Self {
        Self {
            key,
            responsible_node,
            hop_count,
            path,
            success: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_for_benchmark_persistence() {
        let result = LookupResult::ok(123, 456, 3, vec![1, 2, 456]);
        let json = serde_json::to_string(&result).expect("serializable");
        let back: LookupResult = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(result, back);
    }
}
