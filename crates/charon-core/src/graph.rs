use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::types::{ModuleMetadata, NodeType};

pub const THIRD_PARTY_PREFIX: &str = "third_party.";

/// Node in the dependency graph: either an internal module with metadata,
/// or a third-party sink with id `third_party.<package>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ModuleMetadata>,
}

impl GraphNode {
    pub fn is_internal(&self) -> bool {
        matches!(self.node_type, NodeType::Internal)
    }
}

/// Edge in the dependency graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Deduplicated, insertion-order-preserved imported names.
    pub imports: Vec<String>,
    pub weight: usize,
}

/// Directed dependency graph of modules.
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Add (or fetch) an internal module node.
    pub fn add_internal_node(&mut self, id: &str, metadata: ModuleMetadata) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let node = GraphNode {
            id: id.to_string(),
            node_type: NodeType::Internal,
            metadata: Some(metadata),
        };
        let idx = self.graph.add_node(node);
        self.index.insert(id.to_string(), idx);
        idx
    }

    /// Add (or fetch) the sink node for a third-party package.
    pub fn ensure_third_party_node(&mut self, package: &str) -> NodeIndex {
        let id = format!("{THIRD_PARTY_PREFIX}{package}");
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let node = GraphNode {
            id: id.clone(),
            node_type: NodeType::ThirdParty,
            metadata: None,
        };
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        idx
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    /// Add a dependency edge with the accumulated imported names for `(from, to)`.
    /// A self-loop (`from == to`) is silently suppressed, per the no-self-loop invariant.
    /// `imports` being empty (e.g. a Rust bodyless `mod` declaration) still yields weight=1.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, names: &[String]) {
        if from == to {
            return;
        }
        if let Some(edge_idx) = self.graph.find_edge(from, to) {
            let edge = &mut self.graph[edge_idx];
            for name in names {
                if !edge.imports.contains(name) {
                    edge.imports.push(name.clone());
                }
            }
            edge.weight = edge.imports.len().max(edge.weight).max(1);
        } else {
            let mut imports = Vec::new();
            for name in names {
                if !imports.contains(name) {
                    imports.push(name.clone());
                }
            }
            let weight = if imports.is_empty() { 1 } else { imports.len() };
            self.graph.add_edge(from, to, GraphEdge { imports, weight });
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    pub fn internal_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights().filter(|n| n.is_internal())
    }

    pub fn internal_node_indices(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].is_internal())
            .collect()
    }

    pub fn afferent_coupling(&self, idx: NodeIndex) -> usize {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .count()
    }

    pub fn efferent_coupling(&self, idx: NodeIndex) -> usize {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .count()
    }

    pub fn successors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
    }

    pub fn predecessors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
    }

    /// Edge weight (imports) between two nodes, if an edge exists.
    pub fn edge(&self, from: NodeIndex, to: NodeIndex) -> Option<&GraphEdge> {
        self.graph
            .find_edge(from, to)
            .map(|edge_idx| &self.graph[edge_idx])
    }

    pub fn has_edge(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.graph.find_edge(from, to).is_some()
    }

    /// Iterate over all edges with their source and target nodes.
    pub fn edges_with_nodes(&self) -> Vec<(&GraphNode, &GraphNode, &GraphEdge)> {
        self.graph
            .edge_references()
            .map(|e| {
                let src = &self.graph[e.source()];
                let tgt = &self.graph[e.target()];
                (src, tgt, e.weight())
            })
            .collect()
    }

    /// Enumerate simple directed cycles among internal nodes only, capped at
    /// `max_cycles`. Returns (cycles, truncated). Cycles are sorted by
    /// (length, first member id) and each cycle is rotated to start at its
    /// lexicographically smallest member id, for deterministic output.
    pub fn find_cycles(&self, max_cycles: usize) -> (Vec<Vec<String>>, bool) {
        // Restrict to the induced subgraph of internal nodes: external sinks
        // have no outgoing edges so they can never participate in a cycle,
        // but we still must avoid stepping through them.
        let internal: HashSet<NodeIndex> = self.internal_node_indices().into_iter().collect();

        let sccs = petgraph::algo::kosaraju_scc(&self.graph);
        let mut cycles: Vec<Vec<NodeIndex>> = Vec::new();
        let mut truncated = false;

        'scc: for scc in sccs {
            let scc_set: HashSet<NodeIndex> = scc
                .iter()
                .copied()
                .filter(|idx| internal.contains(idx))
                .collect();
            if scc_set.len() < 2 {
                continue;
            }
            let found = self.johnson_cycles_in_subgraph(&scc_set, max_cycles - cycles.len());
            let hit_cap = cycles.len() + found.len() >= max_cycles;
            cycles.extend(found);
            if hit_cap {
                truncated = true;
                break 'scc;
            }
        }

        let mut out: Vec<Vec<String>> = cycles
            .into_iter()
            .map(|cyc| {
                let mut ids: Vec<String> = cyc.iter().map(|&idx| self.graph[idx].id.clone()).collect();
                if let Some(min_pos) = (0..ids.len()).min_by_key(|&i| ids[i].clone()) {
                    ids.rotate_left(min_pos);
                }
                ids
            })
            .collect();
        out.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a[0].cmp(&b[0])));
        (out, truncated)
    }

    /// Johnson's simple-cycle enumeration algorithm, restricted to a single
    /// strongly-connected subset of nodes.
    fn johnson_cycles_in_subgraph(
        &self,
        subset: &HashSet<NodeIndex>,
        budget: usize,
    ) -> Vec<Vec<NodeIndex>> {
        let mut nodes: Vec<NodeIndex> = subset.iter().copied().collect();
        nodes.sort_by_key(|idx| self.graph[*idx].id.clone());

        let mut results = Vec::new();
        for (start_pos, &start) in nodes.iter().enumerate() {
            if results.len() >= budget {
                break;
            }
            // Only consider nodes from start_pos onward (standard Johnson restriction).
            let allowed: HashSet<NodeIndex> = nodes[start_pos..].iter().copied().collect();
            let mut blocked: HashSet<NodeIndex> = HashSet::new();
            let mut block_map: HashMap<NodeIndex, HashSet<NodeIndex>> = HashMap::new();
            let mut stack: Vec<NodeIndex> = Vec::new();
            self.johnson_circuit(
                start,
                start,
                &allowed,
                &mut blocked,
                &mut block_map,
                &mut stack,
                &mut results,
                budget,
            );
        }
        results
    }

    #[allow(clippy::too_many_arguments)]
    fn johnson_circuit(
        &self,
        v: NodeIndex,
        start: NodeIndex,
        allowed: &HashSet<NodeIndex>,
        blocked: &mut HashSet<NodeIndex>,
        block_map: &mut HashMap<NodeIndex, HashSet<NodeIndex>>,
        stack: &mut Vec<NodeIndex>,
        results: &mut Vec<Vec<NodeIndex>>,
        budget: usize,
    ) -> bool {
        if results.len() >= budget {
            return false;
        }
        let mut found = false;
        stack.push(v);
        blocked.insert(v);

        for w in self.successors(v) {
            if !allowed.contains(&w) {
                continue;
            }
            if w == start {
                results.push(stack.clone());
                found = true;
                if results.len() >= budget {
                    break;
                }
            } else if !blocked.contains(&w)
                && self.johnson_circuit(w, start, allowed, blocked, block_map, stack, results, budget)
            {
                found = true;
            }
        }

        if found {
            self.unblock(v, blocked, block_map);
        } else {
            for w in self.successors(v) {
                if !allowed.contains(&w) {
                    continue;
                }
                block_map.entry(w).or_default().insert(v);
            }
        }

        stack.pop();
        found
    }

    fn unblock(
        &self,
        v: NodeIndex,
        blocked: &mut HashSet<NodeIndex>,
        block_map: &mut HashMap<NodeIndex, HashSet<NodeIndex>>,
    ) {
        blocked.remove(&v);
        if let Some(dependents) = block_map.remove(&v) {
            for w in dependents {
                if blocked.contains(&w) {
                    self.unblock(w, blocked, block_map);
                }
            }
        }
    }

    /// BFS hop-distance from `start` to every internal node reachable via
    /// internal-only edges. Used by the fitness engine's `max_depth` rule.
    pub fn bfs_hop_depths(&self, start: NodeIndex) -> HashMap<NodeIndex, usize> {
        let mut depths = HashMap::new();
        let mut queue = VecDeque::new();
        depths.insert(start, 0usize);
        queue.push_back(start);
        while let Some(cur) = queue.pop_front() {
            let d = depths[&cur];
            for next in self.successors(cur) {
                if !self.graph[next].is_internal() {
                    continue;
                }
                if !depths.contains_key(&next) {
                    depths.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }
        depths
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;
    use std::path::PathBuf;

    fn meta() -> ModuleMetadata {
        ModuleMetadata {
            language: crate::types::Language::Python,
            file_path: PathBuf::from("a.py"),
            service: None,
            node_kind: NodeKind::Module,
        }
    }

    #[test]
    fn test_add_node_and_edge() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_internal_node("a", meta());
        let b = graph.add_internal_node("b", meta());
        assert_eq!(graph.node_count(), 2);

        graph.add_edge(a, b, &["helper".to_string()]);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge(a, b).unwrap().weight, 1);
    }

    #[test]
    fn test_self_loop_suppressed() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_internal_node("a", meta());
        graph.add_edge(a, a, &["x".to_string()]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_duplicate_node_reused() {
        let mut graph = DependencyGraph::new();
        graph.add_internal_node("a", meta());
        graph.add_internal_node("a", meta());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_empty_imports_weight_one() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_internal_node("a", meta());
        let b = graph.add_internal_node("b", meta());
        graph.add_edge(a, b, &[]);
        assert_eq!(graph.edge(a, b).unwrap().weight, 1);
    }

    #[test]
    fn test_find_cycles_two_node() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_internal_node("a", meta());
        let b = graph.add_internal_node("b", meta());
        graph.add_edge(a, b, &["x".to_string()]);
        graph.add_edge(b, a, &["y".to_string()]);

        let (cycles, truncated) = graph.find_cycles(10_000);
        assert!(!truncated);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn test_find_cycles_none() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_internal_node("a", meta());
        let b = graph.add_internal_node("b", meta());
        graph.add_edge(a, b, &["x".to_string()]);
        let (cycles, truncated) = graph.find_cycles(10_000);
        assert!(cycles.is_empty());
        assert!(!truncated);
    }

    #[test]
    fn test_third_party_sink_unique() {
        let mut graph = DependencyGraph::new();
        let p1 = graph.ensure_third_party_node("serde");
        let p2 = graph.ensure_third_party_node("serde");
        assert_eq!(p1, p2);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node(p1).id, "third_party.serde");
    }

    #[test]
    fn test_bfs_hop_depths() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_internal_node("a", meta());
        let b = graph.add_internal_node("b", meta());
        let c = graph.add_internal_node("c", meta());
        graph.add_edge(a, b, &[]);
        graph.add_edge(b, c, &[]);
        let depths = graph.bfs_hop_depths(a);
        assert_eq!(depths[&a], 0);
        assert_eq!(depths[&b], 1);
        assert_eq!(depths[&c], 2);
    }
}
