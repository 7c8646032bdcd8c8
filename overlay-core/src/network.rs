//! The in-process network substrate (component B): a registry mapping
//! node ids to live node handles, plus an optional virtual clock used
//! to model round-trip latency without any real I/O.
//!
//! Every "remote" call in this crate is a direct, synchronous method
//! invocation on another node's handle — there is no async, no sockets,
//! no serialization. [`NetworkSimulator`] is the single shared piece of
//! state a benchmark harness constructs once and hands to every node in
//! one overlay instance (§2: "harness constructs B, instantiates N
//! instances of one of {E,F,G} sharing one B").

use overlay_tools::{OverlayError, OverlayId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Implemented by every protocol's node handle so the registry can key
/// entries by id without knowing anything else about the node.
pub trait NodeHandle: Clone {
    fn node_id(&self) -> OverlayId;
}

struct NetworkSimulatorInner<N> {
    nodes: HashMap<OverlayId, N>,
    virtual_time: f64,
    per_hop_delay: f64,
}

/// In-process registry of live nodes for a single overlay instance,
/// shared by `Arc` among every node constructed against it.
///
/// All operations are synchronous and non-failing; absence is
/// represented by an empty result, never an error (§4.B).
#[derive(Clone)]
pub struct NetworkSimulator<N> {
    inner: Arc<Mutex<NetworkSimulatorInner<N>>>,
}

impl<N: NodeHandle> NetworkSimulator<N> {
    /// Construct a fresh, empty network. `per_hop_delay` of `0.0`
    /// (the default) disables virtual-time advancement entirely.
    pub fn new(per_hop_delay: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(NetworkSimulatorInner {
                nodes: HashMap::new(),
                virtual_time: 0.0,
                per_hop_delay,
            })),
        }
    }

    pub fn register(&self, node: N) {
        let id = node.node_id();
        self.inner.lock().nodes.insert(id, node);
        trace!(id, "registered node");
    }

    /// Harness-facing fallible registration (SPEC ambient addition):
    /// rejects a colliding id instead of silently overwriting the
    /// existing entry, the way [`register`](Self::register) does for
    /// the protocol surface's own non-failing contract (§4.B).
    pub fn try_register(&self, node: N) -> Result<(), OverlayError> {
        let id = node.node_id();
        let mut inner = self.inner.lock();
        if inner.nodes.contains_key(&id) {
            return Err(OverlayError::DuplicateNodeId { id });
        }
        inner.nodes.insert(id, node);
        drop(inner);
        trace!(id, "registered node");
        Ok(())
    }

    pub fn unregister(&self, id: OverlayId) {
        self.inner.lock().nodes.remove(&id);
        trace!(id, "unregistered node");
    }

    pub fn get_node(&self, id: OverlayId) -> Option<N> {
        self.inner.lock().nodes.get(&id).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn live_node_ids(&self) -> Vec<OverlayId> {
        self.inner.lock().nodes.keys().copied().collect()
    }

    /// Read-only, monotonically non-decreasing virtual clock.
    pub fn virtual_time(&self) -> f64 {
        self.inner.lock().virtual_time
    }

    pub fn per_hop_delay(&self) -> f64 {
        self.inner.lock().per_hop_delay
    }

    /// Advance the virtual clock by one `per_hop_delay` increment. A
    /// round-structured overlay (XOR) calls this once per lookup
    /// round, not once per peer contacted within the round, so the
    /// clock models RTT-dominated latency under parallel queries
    /// rather than serial ones.
    pub fn advance_time(&self) {
        let mut inner = self.inner.lock();
        let delay = inner.per_hop_delay;
        inner.virtual_time += delay;
        cfg_if::cfg_if! {
            if #[cfg(feature = "verbose-tracing")] {
                tracing::trace!(virtual_time = inner.virtual_time, "advanced virtual clock");
            }
        }
    }
}

impl<N: NodeHandle> Default for NetworkSimulator<N> {
    fn default() -> Self {
        Self::new(0.0)
    }
}
