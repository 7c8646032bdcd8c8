//! The common contract every overlay implements (component D).
//!
//! A harness written against this trait can drive any of RING, XOR, or
//! PREFIX identically — build a network, join every node, stabilize,
//! then issue lookups — without knowing which protocol it's holding.

use crate::lookup_result::LookupResult;
use crate::network::NodeHandle;
use overlay_tools::OverlayId;

/// Shared capability set for a DHT overlay node.
///
/// Every method here is total: none of them raise, and failure is
/// always communicated through the return value (`LookupResult`'s
/// `success` flag, a `bool`, or an `Option`) rather than an error
/// type. See §7 of the design for the rationale.
pub trait DhtNode: NodeHandle {
    /// Join the overlay. With no bootstrap, initializes a fresh
    /// single-node overlay and returns 0. Otherwise contacts the
    /// bootstrap, learns enough state to be routable, registers
    /// itself, and returns an approximate message count.
    ///
    /// Calling `join(None)` a second time on an already-live node is
    /// undefined; callers must not do it.
    fn join(&self, bootstrap_id: Option<OverlayId>) -> u64;

    /// Leave the overlay gracefully: notify neighbours, best-effort
    /// transfer local data to a protocol-defined successor, and
    /// unregister. Idempotent on an already-unregistered node.
    fn leave(&self) -> u64;

    /// Resolve the node responsible for `key`.
    fn lookup(&self, key: OverlayId) -> LookupResult;

    /// Perform a lookup and place `(key, value)` into the responsible
    /// node's local map. Returns `true` iff the lookup succeeded and
    /// the responsible node still lives.
    fn store(&self, key: OverlayId, value: Vec<u8>) -> bool;

    /// Perform a lookup and read from the responsible node's local
    /// map.
    fn retrieve(&self, key: OverlayId) -> Option<Vec<u8>>;

    /// Run one round of the periodic repair protocol.
    fn stabilize(&self);

    /// A protocol-specific count used for state-overhead reporting.
    fn routing_table_size(&self) -> usize;
}
