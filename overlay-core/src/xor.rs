//! XOR (component F): Kademlia-style k-buckets and iterative,
//! alpha-parallel lookup under the XOR distance metric.
//!
//! The responsible node for a key is whichever live node minimizes
//! `id XOR key`; there is no ring order, only "closeness" in the XOR
//! metric.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::config::XorConfig;
use crate::lookup_result::LookupResult;
use crate::network::{NetworkSimulator, NodeHandle};
use crate::node::DhtNode;
use overlay_tools::OverlayId;
use std::collections::HashMap;

fn distance(a: OverlayId, b: OverlayId) -> u64 {
    a ^ b
}

/// `floor(log2(dist))`, with the degenerate `dist == 0` (self) case
/// folded into bucket 0 rather than being undefined.
fn bucket_index(dist: u64) -> usize {
    if dist == 0 {
        0
    } else {
        (63 - dist.leading_zeros()) as usize
    }
}

struct XorInner {
    buckets: Vec<Vec<OverlayId>>,
    data: HashMap<OverlayId, Vec<u8>>,
}

struct XorUnlockedInner {
    node_id: OverlayId,
    config: XorConfig,
    network: NetworkSimulator<XorNode>,
}

#[derive(Clone)]
pub struct XorNode {
    unlocked: Arc<XorUnlockedInner>,
    inner: Arc<Mutex<XorInner>>,
}

impl XorNode {
    pub fn new(node_id: OverlayId, network: NetworkSimulator<XorNode>, config: XorConfig) -> Self {
        let buckets = vec![Vec::new(); config.m as usize];
        Self {
            unlocked: Arc::new(XorUnlockedInner { node_id, config, network }),
            inner: Arc::new(Mutex::new(XorInner { buckets, data: HashMap::new() })),
        }
    }

    /// Harness-facing setup entry point: validates `config` before
    /// constructing, returning `InvalidIdSpace`/`InvalidParameter`
    /// instead of building a node around an unusable `m`/`k`/`alpha`.
    pub fn try_new(
        node_id: OverlayId,
        network: NetworkSimulator<XorNode>,
        config: XorConfig,
    ) -> Result<Self, overlay_tools::OverlayError> {
        config.validate()?;
        Ok(Self::new(node_id, network, config))
    }

    fn update_bucket(&self, node_id: OverlayId) {
        let self_id = self.unlocked.node_id;
        if node_id == self_id {
            return;
        }
        let idx = bucket_index(distance(self_id, node_id));
        let k = self.unlocked.config.k;
        let mut inner = self.inner.lock();
        let bucket = &mut inner.buckets[idx];
        if let Some(pos) = bucket.iter().position(|&n| n == node_id) {
            bucket.remove(pos);
            bucket.push(node_id);
        } else if bucket.len() < k {
            bucket.push(node_id);
        }
        // A full bucket silently drops the newcomer rather than
        // pinging its head to evict the stale entry.
    }

    fn find_closest_local(&self, target: OverlayId, count: usize) -> Vec<OverlayId> {
        let mut all: Vec<OverlayId> = self.inner.lock().buckets.iter().flatten().copied().collect();
        all.sort_by_key(|&n| distance(n, target));
        all.truncate(count);
        all
    }

    /// FIND_NODE: record the querier as freshly seen, then answer with
    /// the k closest ids this node knows of (self included).
    fn find_node_rpc(&self, target: OverlayId, querier_id: OverlayId) -> Vec<OverlayId> {
        self.update_bucket(querier_id);
        let k = self.unlocked.config.k;
        let mut candidates = self.find_closest_local(target, k);
        candidates.push(self.unlocked.node_id);
        candidates.sort_by_key(|&n| distance(n, target));
        candidates.truncate(k);
        candidates
    }
}

impl NodeHandle for XorNode {
    fn node_id(&self) -> OverlayId {
        self.unlocked.node_id
    }
}

impl DhtNode for XorNode {
    fn join(&self, bootstrap_id: Option<OverlayId>) -> u64 {
        self.unlocked.network.register(self.clone());
        let Some(bootstrap_id) = bootstrap_id else {
            return 0;
        };
        self.update_bucket(bootstrap_id);
        let result = self.lookup(self.unlocked.node_id);
        trace!(node = self.unlocked.node_id, hops = result.hop_count, "xor join self-lookup done");
        result.hop_count as u64
    }

    fn leave(&self) -> u64 {
        self.unlocked.network.unregister(self.unlocked.node_id);
        0
    }

    fn lookup(&self, key: OverlayId) -> LookupResult {
        let self_id = self.unlocked.node_id;
        let k = self.unlocked.config.k;
        let alpha = self.unlocked.config.alpha;
        let cap = self.unlocked.config.m * 2;

        let mut shortlist = self.find_closest_local(key, k);
        if shortlist.is_empty() {
            return LookupResult::ok(key, self_id, 0, vec![self_id]);
        }

        let mut queried: HashSet<OverlayId> = HashSet::from([self_id]);
        let mut path = vec![self_id];
        let mut hops: u32 = 0;

        loop {
            let to_query: Vec<OverlayId> = shortlist
                .iter()
                .copied()
                .filter(|n| !queried.contains(n))
                .take(alpha)
                .collect();
            if to_query.is_empty() {
                break;
            }

            hops += 1;
            if self.unlocked.network.per_hop_delay() > 0.0 {
                self.unlocked.network.advance_time();
            }
            let mut found_new = false;

            for nid in to_query {
                queried.insert(nid);
                path.push(nid);

                let Some(target_node) = self.unlocked.network.get_node(nid) else {
                    continue;
                };

                let returned = target_node.find_node_rpc(key, self_id);
                for r in returned {
                    self.update_bucket(r);
                    if r != self_id && !shortlist.contains(&r) {
                        shortlist.push(r);
                        found_new = true;
                    }
                }
            }

            shortlist.sort_by_key(|&n| distance(n, key));
            shortlist.truncate(k);

            if !found_new {
                break;
            }
            if hops > cap {
                break;
            }
        }

        let responsible = shortlist
            .iter()
            .copied()
            .chain(std::iter::once(self_id))
            .min_by_key(|&n| distance(n, key))
            .expect("candidate list always has at least self");
        LookupResult::ok(key, responsible, hops, path)
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
        let mut inner = self.inner.lock();
        for bucket in inner.buckets.iter_mut() {
            bucket.retain(|&nid| network.get_node(nid).is_some());
        }
    }

    fn routing_table_size(&self) -> usize {
        self.inner.lock().buckets.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracles::xor_ground_truth;
    use overlay_tools::generate_node_ids;

    fn build_network(node_ids: &[OverlayId], config: XorConfig, per_hop_delay: f64) -> NetworkSimulator<XorNode> {
        let network = NetworkSimulator::new(per_hop_delay);
        let mut iter = node_ids.iter();
        let first = *iter.next().unwrap();
        XorNode::new(first, network.clone(), config).join(None);
        for &id in iter {
            let node = XorNode::new(id, network.clone(), config);
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
    fn bucket_index_folds_self_distance_to_zero() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(1), 0);
        assert_eq!(bucket_index(2), 1);
        assert_eq!(bucket_index(0b1000), 3);
    }

    #[test]
    fn single_node_is_responsible_for_everything() {
        let config = XorConfig { m: 8, k: 8, alpha: 3 };
        let network: NetworkSimulator<XorNode> = NetworkSimulator::new(0.0);
        let node = XorNode::new(99, network, config);
        node.join(None);
        let result = node.lookup(5);
        assert!(result.success);
        assert_eq!(result.responsible_node, 99);
    }

    #[test]
    fn lookups_match_ground_truth() {
        let config = XorConfig { m: 16, k: 8, alpha: 3 };
        let ids = generate_node_ids(16, config.m, 42);
        let network = build_network(&ids, config, 0.0);
        for key in generate_node_ids(10, config.m, 123) {
            let truth = xor_ground_truth(key, &ids);
            let from = network.get_node(ids[0]).unwrap();
            let result = from.lookup(key);
            assert!(result.success);
            assert_eq!(result.responsible_node, truth, "key={key}");
        }
    }

    #[test]
    fn virtual_clock_advances_once_per_round_not_per_peer() {
        let config = XorConfig { m: 16, k: 8, alpha: 3 };
        let ids = generate_node_ids(10, config.m, 42);
        let network = build_network(&ids, config, 1.0);
        let from = network.get_node(ids[0]).unwrap();
        let before = network.virtual_time();
        let result = from.lookup(generate_node_ids(1, config.m, 999)[0]);
        let after = network.virtual_time();
        assert_eq!(after - before, result.hop_count as f64);
    }

    #[test]
    fn routing_table_size_is_sum_of_buckets() {
        let config = XorConfig { m: 8, k: 8, alpha: 3 };
        let network: NetworkSimulator<XorNode> = NetworkSimulator::new(0.0);
        let node = XorNode::new(1, network, config);
        node.join(None);
        assert_eq!(node.routing_table_size(), 0);
    }

    #[test]
    fn try_new_rejects_zero_k() {
        let network: NetworkSimulator<XorNode> = NetworkSimulator::new(0.0);
        let config = XorConfig { m: 8, k: 0, alpha: 3 };
        assert!(XorNode::try_new(1, network, config).is_err());
    }
}
