//! PREFIX (component G): Pastry-style prefix routing table plus a
//! leaf set of numerically nearby neighbours.
//!
//! The responsible node for a key is the live node numerically closest
//! to it on the ring (by [`circular_distance`]), same metric as RING's
//! successor but reached through prefix matching instead of finger
//! tables.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::config::PrefixConfig;
use crate::lookup_result::LookupResult;
use crate::network::{NetworkSimulator, NodeHandle};
use crate::node::DhtNode;
use overlay_tools::OverlayId;

/// Digit at `position` (0 = most significant) of a `num_digits`-digit,
/// base-`2^b` representation of `node_id`.
fn get_digit(node_id: OverlayId, position: u32, num_digits: u32, b: u32) -> u32 {
    let shift = (num_digits - 1 - position) * b;
    ((node_id >> shift) & ((1u64 << b) - 1)) as u32
}

fn shared_prefix_length(a: OverlayId, b: OverlayId, num_digits: u32, digit_bits: u32) -> u32 {
    for i in 0..num_digits {
        if get_digit(a, i, num_digits, digit_bits) != get_digit(b, i, num_digits, digit_bits) {
            return i;
        }
    }
    num_digits
}

/// Shorter of the two arcs between `a` and `b` on a ring of size
/// `id_space`.
fn circular_distance(a: OverlayId, b: OverlayId, id_space: u64) -> u64 {
    let diff = if a > b { a - b } else { b - a };
    diff.min(id_space - diff)
}

struct PrefixInner {
    routing_table: Vec<Vec<Option<OverlayId>>>,
    leaf_set: Vec<OverlayId>,
    data: HashMap<OverlayId, Vec<u8>>,
}

struct PrefixUnlockedInner {
    node_id: OverlayId,
    id_space: u64,
    num_digits: u32,
    digit_bits: u32,
    config: PrefixConfig,
    network: NetworkSimulator<PrefixNode>,
}

#[derive(Clone)]
pub struct PrefixNode {
    unlocked: Arc<PrefixUnlockedInner>,
    inner: Arc<Mutex<PrefixInner>>,
}

impl PrefixNode {
    pub fn new(node_id: OverlayId, network: NetworkSimulator<PrefixNode>, config: PrefixConfig) -> Self {
        let num_digits = (config.m + config.b - 1) / config.b;
        let base = 1u32 << config.b;
        let id_space = if config.m >= 64 { u64::MAX } else { 1u64 << config.m };
        let routing_table = vec![vec![None; base as usize]; num_digits as usize];
        Self {
            unlocked: Arc::new(PrefixUnlockedInner {
                node_id,
                id_space,
                num_digits,
                digit_bits: config.b,
                config,
                network,
            }),
            inner: Arc::new(Mutex::new(PrefixInner { routing_table, leaf_set: Vec::new(), data: HashMap::new() })),
        }
    }

    /// Harness-facing setup entry point: validates `config` before
    /// constructing, returning `InvalidIdSpace`/`InvalidParameter`
    /// instead of building a node around an unusable `m`/`b`.
    pub fn try_new(
        node_id: OverlayId,
        network: NetworkSimulator<PrefixNode>,
        config: PrefixConfig,
    ) -> Result<Self, overlay_tools::OverlayError> {
        config.validate()?;
        Ok(Self::new(node_id, network, config))
    }

    fn leaf_set_snapshot(&self) -> Vec<OverlayId> {
        self.inner.lock().leaf_set.clone()
    }

    fn routing_table_entries(&self) -> Vec<OverlayId> {
        self.inner.lock().routing_table.iter().flatten().filter_map(|e| *e).collect()
    }

    /// Incorporate a discovered, still-live node into the leaf set and
    /// the routing table. The routing-table slot is first-come: it
    /// only gets overwritten once its current occupant dies.
    fn add_to_state(&self, node_id: OverlayId) {
        let self_id = self.unlocked.node_id;
        if node_id == self_id {
            return;
        }
        if self.unlocked.network.get_node(node_id).is_none() {
            return;
        }

        let id_space = self.unlocked.id_space;
        let leaf_size = self.unlocked.config.leaf_size;
        let num_digits = self.unlocked.num_digits;
        let digit_bits = self.unlocked.digit_bits;

        let mut inner = self.inner.lock();
        if !inner.leaf_set.contains(&node_id) {
            inner.leaf_set.push(node_id);
            inner.leaf_set.sort_by_key(|&x| circular_distance(self_id, x, id_space));
            inner.leaf_set.truncate(leaf_size);
        }

        let plen = shared_prefix_length(self_id, node_id, num_digits, digit_bits);
        if plen < num_digits {
            let digit = get_digit(node_id, plen, num_digits, digit_bits);
            let network = &self.unlocked.network;
            let slot = &mut inner.routing_table[plen as usize][digit as usize];
            let occupant_dead = match slot {
                Some(cur) => network.get_node(*cur).is_none(),
                None => true,
            };
            if occupant_dead {
                *slot = Some(node_id);
            }
        }
    }

    /// Next hop toward `key`, or `None` if this node is the closest
    /// live node it knows of.
    fn route_next(&self, key: OverlayId) -> Option<OverlayId> {
        let self_id = self.unlocked.node_id;
        let id_space = self.unlocked.id_space;
        let my_dist = circular_distance(self_id, key, id_space);
        if my_dist == 0 {
            return None;
        }

        let num_digits = self.unlocked.num_digits;
        let digit_bits = self.unlocked.digit_bits;
        let network = &self.unlocked.network;

        let plen = shared_prefix_length(self_id, key, num_digits, digit_bits);
        if plen < num_digits {
            let digit = get_digit(key, plen, num_digits, digit_bits);
            let entry = self.inner.lock().routing_table[plen as usize][digit as usize];
            if let Some(entry) = entry {
                if network.get_node(entry).is_some() {
                    return Some(entry);
                }
            }
        }

        // Candidates must be strictly closer than this node itself —
        // `best_dist` starts at `my_dist`, not infinity.
        let mut best: Option<OverlayId> = None;
        let mut best_dist = my_dist;

        let leaf_set = self.leaf_set_snapshot();
        for nid in leaf_set {
            if network.get_node(nid).is_none() {
                continue;
            }
            let d = circular_distance(nid, key, id_space);
            if d < best_dist || (d == best_dist && best.is_some_and(|b| nid < b)) {
                best = Some(nid);
                best_dist = d;
            }
        }

        let routing_table = self.inner.lock().routing_table.clone();
        for row in routing_table {
            for entry in row.into_iter().flatten() {
                if network.get_node(entry).is_none() {
                    continue;
                }
                let d = circular_distance(entry, key, id_space);
                if d < best_dist || (d == best_dist && best.is_some_and(|b| entry < b)) {
                    best = Some(entry);
                    best_dist = d;
                }
            }
        }

        best
    }
}

impl NodeHandle for PrefixNode {
    fn node_id(&self) -> OverlayId {
        self.unlocked.node_id
    }
}

impl DhtNode for PrefixNode {
    fn join(&self, bootstrap_id: Option<OverlayId>) -> u64 {
        self.unlocked.network.register(self.clone());
        let Some(bootstrap_id) = bootstrap_id else {
            return 0;
        };
        let Some(bootstrap) = self.unlocked.network.get_node(bootstrap_id) else {
            return 0;
        };

        let mut messages = 0u64;

        self.add_to_state(bootstrap_id);
        for nid in bootstrap.leaf_set_snapshot() {
            self.add_to_state(nid);
        }
        for entry in bootstrap.routing_table_entries() {
            self.add_to_state(entry);
        }
        messages += 1;

        let self_id = self.unlocked.node_id;
        let result = self.lookup(self_id);
        messages += result.hop_count as u64;

        for nid in result.path {
            if nid == self_id {
                continue;
            }
            if let Some(node) = self.unlocked.network.get_node(nid) {
                for leaf_id in node.leaf_set_snapshot() {
                    self.add_to_state(leaf_id);
                }
                for entry in node.routing_table_entries() {
                    self.add_to_state(entry);
                }
                messages += 1;
            }
        }

        for leaf_id in self.leaf_set_snapshot() {
            if let Some(leaf) = self.unlocked.network.get_node(leaf_id) {
                leaf.add_to_state(self_id);
                messages += 1;
            }
        }

        trace!(node = self_id, %messages, "prefix join complete");
        messages
    }

    fn leave(&self) -> u64 {
        let self_id = self.unlocked.node_id;
        let mut messages = 0u64;

        for leaf_id in self.leaf_set_snapshot() {
            let Some(leaf) = self.unlocked.network.get_node(leaf_id) else {
                continue;
            };
            let mut leaf_inner = leaf.inner.lock();
            if let Some(pos) = leaf_inner.leaf_set.iter().position(|&n| n == self_id) {
                leaf_inner.leaf_set.remove(pos);
            }
            for row in leaf_inner.routing_table.iter_mut() {
                for cell in row.iter_mut() {
                    if *cell == Some(self_id) {
                        *cell = None;
                    }
                }
            }
            drop(leaf_inner);
            messages += 1;
        }

        let id_space = self.unlocked.id_space;
        let leaf_set = self.leaf_set_snapshot();
        if let Some(&closest) = leaf_set.iter().min_by_key(|&&x| circular_distance(self_id, x, id_space)) {
            if let Some(closest_node) = self.unlocked.network.get_node(closest) {
                let data = self.inner.lock().data.clone();
                closest_node.inner.lock().data.extend(data);
            }
        }

        self.unlocked.network.unregister(self_id);
        messages
    }

    fn lookup(&self, key: OverlayId) -> LookupResult {
        let cap = self.unlocked.config.m * 2;
        let mut current = self.clone();
        let mut hops: u32 = 0;
        let mut path = vec![self.unlocked.node_id];
        let mut visited: HashSet<OverlayId> = HashSet::from([self.unlocked.node_id]);

        loop {
            if hops > cap {
                return LookupResult::failed(key, current.unlocked.node_id, hops, path);
            }

            let next_hop = current.route_next(key);
            let Some(next_hop) = next_hop else {
                return LookupResult::ok(key, current.unlocked.node_id, hops, path);
            };
            if visited.contains(&next_hop) {
                return LookupResult::ok(key, current.unlocked.node_id, hops, path);
            }

            let Some(next_node) = self.unlocked.network.get_node(next_hop) else {
                return LookupResult::ok(key, current.unlocked.node_id, hops, path);
            };

            hops += 1;
            path.push(next_hop);
            visited.insert(next_hop);
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
        let network = &self.unlocked.network;
        {
            let mut inner = self.inner.lock();
            inner.leaf_set.retain(|&nid| network.get_node(nid).is_some());
            for row in inner.routing_table.iter_mut() {
                for cell in row.iter_mut() {
                    if let Some(entry) = cell {
                        if network.get_node(*entry).is_none() {
                            *cell = None;
                        }
                    }
                }
            }
        }

        for leaf_id in self.leaf_set_snapshot() {
            let Some(leaf) = network.get_node(leaf_id) else {
                continue;
            };
            for other_id in leaf.leaf_set_snapshot() {
                self.add_to_state(other_id);
            }
            for entry in leaf.routing_table_entries() {
                self.add_to_state(entry);
            }
        }
    }

    fn routing_table_size(&self) -> usize {
        let inner = self.inner.lock();
        inner.leaf_set.len() + inner.routing_table.iter().flatten().filter(|e| e.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracles::prefix_ground_truth;
    use overlay_tools::generate_node_ids;

    fn build_network(node_ids: &[OverlayId], config: PrefixConfig) -> NetworkSimulator<PrefixNode> {
        let network = NetworkSimulator::new(0.0);
        let mut iter = node_ids.iter();
        let first = *iter.next().unwrap();
        PrefixNode::new(first, network.clone(), config).join(None);
        for &id in iter {
            let node = PrefixNode::new(id, network.clone(), config);
            node.join(Some(first));
        }
        for _ in 0..node_ids.len() * 3 {
            for &id in node_ids {
                network.get_node(id).unwrap().stabilize();
            }
        }
        network
    }

    #[test]
    fn digit_extraction_is_big_endian() {
        // m=8, b=4 -> 2 digits. id 0xAB should split into 0xA, 0xB.
        assert_eq!(get_digit(0xAB, 0, 2, 4), 0xA);
        assert_eq!(get_digit(0xAB, 1, 2, 4), 0xB);
    }

    #[test]
    fn single_node_is_responsible_for_everything() {
        let config = PrefixConfig { m: 8, b: 4, leaf_size: 8 };
        let network: NetworkSimulator<PrefixNode> = NetworkSimulator::new(0.0);
        let node = PrefixNode::new(17, network, config);
        node.join(None);
        let result = node.lookup(200);
        assert!(result.success);
        assert_eq!(result.responsible_node, 17);
    }

    #[test]
    fn lookups_match_ground_truth_after_stabilizing() {
        let config = PrefixConfig { m: 16, b: 4, leaf_size: 8 };
        let ids = generate_node_ids(14, config.m, 42);
        let network = build_network(&ids, config);
        for key in generate_node_ids(12, config.m, 123) {
            let truth = prefix_ground_truth(key, &ids, config.m);
            let from = network.get_node(ids[0]).unwrap();
            let result = from.lookup(key);
            assert!(result.success);
            assert_eq!(result.responsible_node, truth, "key={key}");
        }
    }

    #[test]
    fn routing_table_size_counts_leaf_set_and_filled_cells() {
        let config = PrefixConfig { m: 8, b: 4, leaf_size: 8 };
        let network: NetworkSimulator<PrefixNode> = NetworkSimulator::new(0.0);
        let node = PrefixNode::new(1, network, config);
        node.join(None);
        assert_eq!(node.routing_table_size(), 0);
    }

    #[test]
    fn try_new_rejects_digit_width_wider_than_id_space() {
        let network: NetworkSimulator<PrefixNode> = NetworkSimulator::new(0.0);
        let config = PrefixConfig { m: 8, b: 16, leaf_size: 8 };
        assert!(PrefixNode::try_new(1, network, config).is_err());
    }
}
