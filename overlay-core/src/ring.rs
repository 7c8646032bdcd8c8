//! RING (component E): Chord-style consistent hashing with a finger
//! table and a successor-list fallback for fault tolerance.
//!
//! The responsible node for a key is its successor on the identifier
//! ring — the first live id reached by walking clockwise from the key,
//! wrapping past `2^m - 1` back to `0`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::config::RingConfig;
use crate::lookup_result::LookupResult;
use crate::network::{NetworkSimulator, NodeHandle};
use crate::node::DhtNode;
use overlay_tools::OverlayId;

/// Is `x` in the open ring interval `(a, b)`?
///
/// `a == b` denotes the whole ring minus the single point `a`, per the
/// usual Chord convention for a one-node ring.
fn in_open(x: OverlayId, a: OverlayId, b: OverlayId) -> bool {
    if a == b {
        x != a
    } else if a < b {
        a < x && x < b
    } else {
        x > a || x < b
    }
}

/// Is `x` in the half-open ring interval `(a, b]`?
fn in_half_open(x: OverlayId, a: OverlayId, b: OverlayId) -> bool {
    if a == b {
        true
    } else if a < b {
        a < x && x <= b
    } else {
        x > a || x <= b
    }
}

fn offset_target(node_id: OverlayId, i: u32, id_space: u128) -> OverlayId {
    let shift = 1u128 << i;
    ((node_id as u128 + shift) % id_space) as u64
}

struct RingInner {
    predecessor: Option<OverlayId>,
    successor: OverlayId,
    finger_table: Vec<OverlayId>,
    successor_list: Vec<OverlayId>,
    data: HashMap<OverlayId, Vec<u8>>,
}

struct RingUnlockedInner {
    node_id: OverlayId,
    id_space: u128,
    config: RingConfig,
    network: NetworkSimulator<RingNode>,
}

/// Cheap-to-clone handle to a ring node's shared state. Every "remote"
/// method call below is a direct invocation against another node's
/// handle fetched from the shared [`NetworkSimulator`] — there is no
/// wire format and no failure mode beyond "the id isn't registered".
#[derive(Clone)]
pub struct RingNode {
    unlocked: Arc<RingUnlockedInner>,
    inner: Arc<Mutex<RingInner>>,
}

impl RingNode {
    pub fn new(node_id: OverlayId, network: NetworkSimulator<RingNode>, config: RingConfig) -> Self {
        let id_space: u128 = if config.m >= 127 { u128::MAX } else { 1u128 << config.m };
        let inner = RingInner {
            predecessor: None,
            successor: node_id,
            finger_table: vec![node_id; config.m as usize],
            successor_list: Vec::new(),
            data: HashMap::new(),
        };
        Self {
            unlocked: Arc::new(RingUnlockedInner {
                node_id,
                id_space,
                config,
                network,
            }),
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Harness-facing setup entry point: validates `config` before
    /// constructing, returning `InvalidIdSpace` instead of building a
    /// node around an unusable `m`.
    pub fn try_new(
        node_id: OverlayId,
        network: NetworkSimulator<RingNode>,
        config: RingConfig,
    ) -> Result<Self, overlay_tools::OverlayError> {
        config.validate()?;
        Ok(Self::new(node_id, network, config))
    }

    fn successor(&self) -> OverlayId {
        self.inner.lock().successor
    }

    fn predecessor(&self) -> Option<OverlayId> {
        self.inner.lock().predecessor
    }

    fn closest_preceding_finger(&self, key: OverlayId) -> OverlayId {
        let id = self.unlocked.node_id;
        let network = &self.unlocked.network;
        let fingers = self.inner.lock().finger_table.clone();
        for &f in fingers.iter().rev() {
            if f != id && in_open(f, id, key) && network.get_node(f).is_some() {
                return f;
            }
        }
        id
    }

    fn notify(&self, candidate_id: OverlayId) {
        let id = self.unlocked.node_id;
        if candidate_id == id {
            return;
        }
        let mut inner = self.inner.lock();
        let accept = match inner.predecessor {
            None => true,
            Some(p) => in_open(candidate_id, p, id),
        };
        if accept {
            inner.predecessor = Some(candidate_id);
        }
    }
}

impl NodeHandle for RingNode {
    fn node_id(&self) -> OverlayId {
        self.unlocked.node_id
    }
}

impl DhtNode for RingNode {
    fn join(&self, bootstrap_id: Option<OverlayId>) -> u64 {
        let node_id = self.unlocked.node_id;
        let m = self.unlocked.config.m;

        let Some(bootstrap_id) = bootstrap_id else {
            let mut inner = self.inner.lock();
            inner.predecessor = None;
            inner.successor = node_id;
            inner.finger_table = vec![node_id; m as usize];
            drop(inner);
            self.unlocked.network.register(self.clone());
            return 0;
        };

        // Joining against an id that isn't live is a precondition
        // violation the caller is responsible for avoiding, not a
        // runtime failure mode of the protocol itself.
        let bootstrap = self
            .unlocked
            .network
            .get_node(bootstrap_id)
            .expect("join: bootstrap id must refer to a live node");

        let result = bootstrap.lookup(node_id);
        let mut messages = result.hop_count as u64 + 1;
        let successor = result.responsible_node;

        let mut finger_table = vec![node_id; m as usize];
        finger_table[0] = successor;
        for i in 1..m {
            let target = offset_target(node_id, i, self.unlocked.id_space);
            let result = bootstrap.lookup(target);
            finger_table[i as usize] = result.responsible_node;
            messages += result.hop_count as u64 + 1;
        }

        let mut inner = self.inner.lock();
        inner.predecessor = None;
        inner.successor = successor;
        inner.finger_table = finger_table;
        drop(inner);

        self.unlocked.network.register(self.clone());
        trace!(node = node_id, %messages, "ring join complete");
        messages
    }

    fn leave(&self) -> u64 {
        let node_id = self.unlocked.node_id;
        let mut messages = 0u64;

        let (successor, predecessor, data) = {
            let inner = self.inner.lock();
            (inner.successor, inner.predecessor, inner.data.clone())
        };

        if successor != node_id {
            if let Some(succ) = self.unlocked.network.get_node(successor) {
                succ.inner.lock().predecessor = predecessor;
                messages += 1;
            }
        }

        if let Some(pred_id) = predecessor {
            if pred_id != node_id {
                if let Some(pred) = self.unlocked.network.get_node(pred_id) {
                    let mut pred_inner = pred.inner.lock();
                    pred_inner.successor = successor;
                    pred_inner.finger_table[0] = successor;
                    messages += 1;
                }
            }
        }

        if successor != node_id {
            if let Some(succ) = self.unlocked.network.get_node(successor) {
                succ.inner.lock().data.extend(data);
            }
        }

        self.unlocked.network.unregister(node_id);
        messages
    }

    fn lookup(&self, key: OverlayId) -> LookupResult {
        let cap = self.unlocked.config.m * 2;
        let mut current = self.clone();
        let mut hops: u32 = 0;
        let mut path = vec![self.unlocked.node_id];

        loop {
            if hops > cap {
                return LookupResult::failed(key, OverlayId::MAX, hops, path);
            }

            let cur_id = current.unlocked.node_id;
            let succ = current.successor();

            if in_half_open(key, cur_id, succ) {
                return LookupResult::ok(key, succ, hops, path);
            }

            let next_id = current.closest_preceding_finger(key);
            if next_id == cur_id {
                return LookupResult::ok(key, succ, hops, path);
            }

            let Some(next_node) = self.unlocked.network.get_node(next_id) else {
                return LookupResult::ok(key, succ, hops, path);
            };

            hops += 1;
            path.push(next_id);
            current = next_node;
        }
    }

    fn store(&self, key: OverlayId, value: Vec<u8>) -> bool {
        let result = self.lookup(key);
        if !result.success {
            return false;
        }
        match self.unlocked.network.get_node(result.responsible_node) {
            Some(target) => {
                target.inner.lock().data.insert(key, value);
                true
            }
            None => false,
        }
    }

    fn retrieve(&self, key: OverlayId) -> Option<Vec<u8>> {
        let result = self.lookup(key);
        if !result.success {
            return None;
        }
        let target = self.unlocked.network.get_node(result.responsible_node)?;
        target.inner.lock().data.get(&key).cloned()
    }

    fn stabilize(&self) {
        let node_id = self.unlocked.node_id;
        let m = self.unlocked.config.m;
        let successor_list_size = self.unlocked.config.successor_list_size;

        let current_successor = self.inner.lock().successor;
        let mut succ = self.unlocked.network.get_node(current_successor);

        if succ.is_none() {
            let backups = self.inner.lock().successor_list.clone();
            let mut replacement = None;
            for backup in backups {
                if let Some(node) = self.unlocked.network.get_node(backup) {
                    replacement = Some((backup, node));
                    break;
                }
            }
            match replacement {
                Some((backup, node)) => {
                    let mut inner = self.inner.lock();
                    inner.successor = backup;
                    inner.finger_table[0] = backup;
                    drop(inner);
                    succ = Some(node);
                }
                None => {
                    self.inner.lock().successor = node_id;
                    return;
                }
            }
        }
        let succ = succ.expect("succ resolved above");

        let successor = self.inner.lock().successor;
        if let Some(x) = succ.predecessor() {
            if x != node_id && self.unlocked.network.get_node(x).is_some() && in_open(x, node_id, successor) {
                let mut inner = self.inner.lock();
                inner.successor = x;
                inner.finger_table[0] = x;
            }
        }

        let successor_now = self.inner.lock().successor;
        if let Some(succ_node) = self.unlocked.network.get_node(successor_now) {
            succ_node.notify(node_id);
        }

        for i in 0..m {
            let target = offset_target(node_id, i, self.unlocked.id_space);
            let result = self.lookup(target);
            if result.success {
                self.inner.lock().finger_table[i as usize] = result.responsible_node;
            }
        }

        let mut successor_list = Vec::with_capacity(successor_list_size);
        let mut cur = self.inner.lock().successor;
        for _ in 0..successor_list_size {
            if cur == node_id {
                break;
            }
            successor_list.push(cur);
            match self.unlocked.network.get_node(cur) {
                Some(node) => cur = node.successor(),
                None => break,
            }
        }
        self.inner.lock().successor_list = successor_list;
    }

    fn routing_table_size(&self) -> usize {
        let node_id = self.unlocked.node_id;
        let inner = self.inner.lock();
        let distinct: HashSet<OverlayId> = inner
            .finger_table
            .iter()
            .copied()
            .filter(|&f| f != node_id)
            .collect();
        distinct.len()
    }
}
