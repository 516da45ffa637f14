//! The undirected topology graph (`spec.md` §4.4).
//!
//! Neighbor relationships are id-sets, not pointers, so there is no
//! cycle-in-memory concern for BFS — it walks ids with a visited set
//! (`spec.md` §9).

use std::collections::{HashMap, HashSet, VecDeque};

use dashmap::DashMap;
use fabric_common::error::FabricError;
use fabric_common::estimate::path_rtt_estimate;

#[derive(Clone, Default)]
struct Node {
    region: Option<String>,
    rtt_hint_ms: Option<u32>,
    neighbors: HashSet<String>,
    metadata: Option<serde_json::Value>,
}

pub struct PathResult {
    pub path: Vec<String>,
    pub hops: usize,
    pub estimated_rtt_ms: u32,
}

pub struct TopologyGraph {
    nodes: DashMap<String, Node>,
}

impl Default for TopologyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Create node if absent; merge (not replace) the neighbor set; add
    /// the reverse edge for any neighbor that already exists as a node;
    /// repair the case where a neighbor upserted `node_id` into its own
    /// set before `node_id` itself existed.
    pub fn upsert(
        &self,
        node_id: &str,
        region: Option<String>,
        rtt_hint_ms: Option<u32>,
        neighbors: &[String],
        metadata: Option<serde_json::Value>,
    ) {
        let cleaned: Vec<String> = neighbors
            .iter()
            .filter(|n| !n.is_empty() && n.as_str() != node_id)
            .cloned()
            .collect();

        {
            let mut entry = self.nodes.entry(node_id.to_string()).or_default();
            if let Some(r) = region {
                entry.region = Some(r);
            }
            if let Some(h) = rtt_hint_ms {
                entry.rtt_hint_ms = Some(h);
            }
            if let Some(m) = metadata {
                entry.metadata = Some(m);
            }
            for n in &cleaned {
                entry.neighbors.insert(n.clone());
            }
        }

        for n in &cleaned {
            if let Some(mut other) = self.nodes.get_mut(n) {
                other.neighbors.insert(node_id.to_string());
            }
        }

        let repairs: Vec<String> = self
            .nodes
            .iter()
            .filter(|e| e.key() != node_id && e.value().neighbors.contains(node_id))
            .map(|e| e.key().clone())
            .collect();
        if !repairs.is_empty() {
            if let Some(mut me) = self.nodes.get_mut(node_id) {
                for r in repairs {
                    me.neighbors.insert(r);
                }
            }
        }
    }

    /// Delete the node and every edge incident to it.
    pub fn remove(&self, node_id: &str) {
        self.nodes.remove(node_id);
        for mut entry in self.nodes.iter_mut() {
            entry.neighbors.remove(node_id);
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Undirected adjacency lists, sorted for deterministic output.
    pub fn snapshot(&self) -> HashMap<String, Vec<String>> {
        self.nodes
            .iter()
            .map(|e| {
                let mut ns: Vec<String> = e.value().neighbors.iter().cloned().collect();
                ns.sort();
                (e.key().clone(), ns)
            })
            .collect()
    }

    /// BFS from `from` to `to`, first discovered path wins (shortest by
    /// hop count; tie-break is neighbor iteration order, unspecified).
    pub fn path(&self, from: &str, to: &str) -> Result<PathResult, FabricError> {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return Err(FabricError::NotFound(format!(
                "unknown endpoint in path({from}, {to})"
            )));
        }
        if from == to {
            return Ok(PathResult {
                path: vec![from.to_string()],
                hops: 0,
                estimated_rtt_ms: 0,
            });
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut parent: HashMap<String, String> = HashMap::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        visited.insert(from.to_string());
        queue.push_back(from.to_string());
        let mut found = false;

        while let Some(cur) = queue.pop_front() {
            if cur == to {
                found = true;
                break;
            }
            if let Some(node) = self.nodes.get(&cur) {
                for n in node.neighbors.iter() {
                    if visited.insert(n.clone()) {
                        parent.insert(n.clone(), cur.clone());
                        queue.push_back(n.clone());
                    }
                }
            }
        }

        if !found {
            return Err(FabricError::NotFound(format!(
                "{to} unreachable from {from}"
            )));
        }

        let mut path = vec![to.to_string()];
        let mut cur = to.to_string();
        while cur != from {
            let p = parent.get(&cur).expect("BFS parent chain is complete").clone();
            path.push(p.clone());
            cur = p;
        }
        path.reverse();

        let hops = path.len() - 1;
        let first_hop_rtt = self
            .nodes
            .get(&path[1])
            .and_then(|n| n.rtt_hint_ms)
            .unwrap_or(0);
        let estimated_rtt_ms = path_rtt_estimate(hops, first_hop_rtt);

        Ok(PathResult {
            path,
            hops,
            estimated_rtt_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_enforces_symmetric_neighbor_sets() {
        let g = TopologyGraph::new();
        g.upsert("A", None, None, &["B".to_string()], None);
        g.upsert("B", None, None, &[], None);

        let snap = g.snapshot();
        assert_eq!(snap["A"], vec!["B".to_string()]);
        assert_eq!(snap["B"], vec!["A".to_string()]);
    }

    #[test]
    fn upsert_repairs_reverse_edge_discovered_after_the_fact() {
        let g = TopologyGraph::new();
        // B lists A before A exists as a node.
        g.upsert("B", None, None, &["A".to_string()], None);
        g.upsert("A", None, None, &[], None);

        let snap = g.snapshot();
        assert_eq!(snap["A"], vec!["B".to_string()]);
        assert_eq!(snap["B"], vec!["A".to_string()]);
    }

    #[test]
    fn upsert_ignores_self_edges_and_empty_strings() {
        let g = TopologyGraph::new();
        g.upsert(
            "A",
            None,
            None,
            &["A".to_string(), "".to_string(), "B".to_string()],
            None,
        );
        assert_eq!(g.snapshot()["A"], vec!["B".to_string()]);
    }

    #[test]
    fn remove_deletes_node_and_incident_edges() {
        let g = TopologyGraph::new();
        g.upsert("A", None, None, &["B".to_string()], None);
        g.upsert("B", None, None, &["C".to_string()], None);
        g.remove("B");

        let snap = g.snapshot();
        assert!(!snap.contains_key("B"));
        assert_eq!(snap["A"], Vec::<String>::new());
        assert_eq!(snap["C"], Vec::<String>::new());
    }

    #[test]
    fn path_is_shortest_and_monotone() {
        let g = TopologyGraph::new();
        g.upsert("A", None, None, &["B".to_string()], None);
        g.upsert("B", None, None, &["C".to_string()], None);
        g.upsert("D", None, Some(10), &["A".to_string(), "C".to_string()], None);

        let result = g.path("A", "C").unwrap();
        assert_eq!(result.path.first().unwrap(), "A");
        assert_eq!(result.path.last().unwrap(), "C");
        // A-D-C is also 2 hops; both are valid shortest paths.
        assert_eq!(result.hops, 2);
    }

    #[test]
    fn path_fails_not_found_for_unknown_endpoint() {
        let g = TopologyGraph::new();
        g.upsert("A", None, None, &[], None);
        assert!(g.path("A", "ghost").is_err());
        assert!(g.path("ghost", "A").is_err());
    }

    #[test]
    fn path_fails_not_found_when_unreachable() {
        let g = TopologyGraph::new();
        g.upsert("A", None, None, &[], None);
        g.upsert("B", None, None, &[], None);
        assert!(g.path("A", "B").is_err());
    }

    #[test]
    fn single_hop_estimate_uses_neighbor_rtt_hint() {
        let g = TopologyGraph::new();
        g.upsert("A", None, None, &["B".to_string()], None);
        g.upsert("B", None, Some(40), &["A".to_string()], None);
        let result = g.path("A", "B").unwrap();
        assert_eq!(result.hops, 1);
        assert_eq!(result.estimated_rtt_ms, 40);
    }
}
