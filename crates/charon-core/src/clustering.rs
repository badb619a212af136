//! Community detection and package-boundary suggestions.
//!
//! Communities are found with a label-propagation-style greedy modularity
//! optimization: synchronous label updates in sorted-id order, ties broken
//! by the lexicographically smallest label, until convergence or an
//! iteration cap. This keeps output deterministic for a given graph, which
//! a randomized async propagation would not guarantee.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::graph::DependencyGraph;

const MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub members: Vec<String>,
    pub cohesion: f64,
    pub modularity_contribution: f64,
    pub avg_internal_coupling: f64,
    pub is_package_candidate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSuggestion {
    pub prefix: String,
    pub modules: Vec<String>,
}

/// Undirected adjacency (id -> neighbor id -> combined edge weight) built
/// from the internal subgraph. `resolution` is reserved for scaling the
/// modularity-gain tolerance between merges of near-equal size; at 1.0 it
/// has no effect on the label-propagation pass.
fn undirected_adjacency(graph: &DependencyGraph) -> HashMap<String, HashMap<String, usize>> {
    let mut adj: HashMap<String, HashMap<String, usize>> = HashMap::new();
    for id in graph.internal_nodes().map(|n| n.id.clone()) {
        adj.entry(id).or_default();
    }
    for (from, to, edge) in graph.edges_with_nodes() {
        if !from.is_internal() || !to.is_internal() {
            continue;
        }
        *adj.entry(from.id.clone()).or_default().entry(to.id.clone()).or_insert(0) += edge.weight;
        *adj.entry(to.id.clone()).or_default().entry(from.id.clone()).or_insert(0) += edge.weight;
    }
    adj
}

fn propagate_labels(adj: &HashMap<String, HashMap<String, usize>>) -> HashMap<String, String> {
    let mut ids: Vec<String> = adj.keys().cloned().collect();
    ids.sort();

    let mut labels: HashMap<String, String> = ids.iter().cloned().map(|id| (id.clone(), id)).collect();

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for id in &ids {
            let neighbors = &adj[id];
            if neighbors.is_empty() {
                continue;
            }
            let mut tally: HashMap<&str, usize> = HashMap::new();
            for (nbr, weight) in neighbors {
                *tally.entry(labels[nbr].as_str()).or_insert(0) += weight;
            }
            let best = tally
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(label, _)| label.to_string());
            if let Some(best) = best {
                if labels[id] != best {
                    labels.insert(id.clone(), best);
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    labels
}

pub fn detect_clusters(graph: &DependencyGraph, _resolution: f64) -> Vec<Cluster> {
    let adj = undirected_adjacency(graph);
    if adj.is_empty() {
        return Vec::new();
    }

    let labels = propagate_labels(&adj);

    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    for (id, label) in &labels {
        groups.entry(label.clone()).or_default().push(id.clone());
    }

    let total_edges: usize = adj.values().map(|n| n.values().sum::<usize>()).sum::<usize>() / 2;
    let total_weight = (total_edges * 2).max(1) as f64;

    let mut members_sorted: Vec<(String, Vec<String>)> = groups.into_iter().collect();
    members_sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut clusters = Vec::new();
    for (cluster_id, (_, mut members)) in members_sorted.into_iter().enumerate() {
        members.sort();
        let member_set: std::collections::HashSet<&str> = members.iter().map(|s| s.as_str()).collect();

        let mut internal_edges = 0usize;
        let mut internal_weight = 0usize;
        let mut external_edges = 0usize;
        let mut degree_sum = 0usize;

        for id in &members {
            let neighbors = &adj[id];
            degree_sum += neighbors.values().sum::<usize>();
            for (nbr, weight) in neighbors {
                if member_set.contains(nbr.as_str()) {
                    internal_edges += 1;
                    internal_weight += weight;
                } else {
                    external_edges += 1;
                }
            }
        }
        // each internal edge counted twice (once from each endpoint)
        internal_edges /= 2;
        internal_weight /= 2;

        let cohesion_denom = internal_edges + external_edges;
        let cohesion = if cohesion_denom > 0 {
            internal_edges as f64 / cohesion_denom as f64
        } else {
            0.0
        };
        let modularity_contribution =
            (internal_weight as f64 * 2.0) / total_weight - (degree_sum as f64 / total_weight).powi(2);
        let avg_internal_coupling = if internal_edges > 0 {
            internal_weight as f64 / internal_edges as f64
        } else {
            0.0
        };
        let is_package_candidate = cohesion > 0.7 && external_edges < internal_edges;

        clusters.push(Cluster {
            id: cluster_id,
            members,
            cohesion,
            modularity_contribution,
            avg_internal_coupling,
            is_package_candidate,
        });
    }
    clusters
}

/// Suggest package boundaries from package-candidate clusters of size >= 3,
/// grouped by their members' longest common dotted prefix.
pub fn suggest_packages(clusters: &[Cluster]) -> Vec<PackageSuggestion> {
    let mut suggestions = Vec::new();
    for cluster in clusters {
        if !cluster.is_package_candidate || cluster.members.len() < 3 {
            continue;
        }
        if let Some(prefix) = longest_common_prefix(&cluster.members) {
            if !prefix.is_empty() {
                suggestions.push(PackageSuggestion {
                    prefix,
                    modules: cluster.members.clone(),
                });
            }
        }
    }
    suggestions
}

fn longest_common_prefix(members: &[String]) -> Option<String> {
    let sep = if members.first()?.contains("::") { "::" } else { "." };
    let split: Vec<Vec<&str>> = members.iter().map(|m| m.split(sep).collect()).collect();
    let first = split.first()?;
    let mut common = Vec::new();
    for (i, part) in first.iter().enumerate() {
        if split.iter().all(|s| s.get(i) == Some(part)) {
            common.push(*part);
        } else {
            break;
        }
    }
    if common.is_empty() {
        None
    } else {
        Some(common.join(sep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Language, ModuleMetadata, NodeKind};
    use std::path::PathBuf;

    fn meta() -> ModuleMetadata {
        ModuleMetadata {
            language: Language::Python,
            file_path: PathBuf::from("x.py"),
            service: None,
            node_kind: NodeKind::Module,
        }
    }

    #[test]
    fn test_two_tight_groups_split() {
        let mut g = DependencyGraph::new();
        let ids = ["a.one", "a.two", "a.three", "b.one", "b.two", "b.three"];
        let idx: Vec<_> = ids.iter().map(|id| g.add_internal_node(id, meta())).collect();
        // tight triangle within "a", tight triangle within "b", one bridge edge
        g.add_edge(idx[0], idx[1], &[]);
        g.add_edge(idx[1], idx[2], &[]);
        g.add_edge(idx[2], idx[0], &[]);
        g.add_edge(idx[3], idx[4], &[]);
        g.add_edge(idx[4], idx[5], &[]);
        g.add_edge(idx[5], idx[3], &[]);
        g.add_edge(idx[0], idx[3], &[]);

        let clusters = detect_clusters(&g, 1.0);
        assert!(clusters.len() >= 2);
        let total_members: usize = clusters.iter().map(|c| c.members.len()).sum();
        assert_eq!(total_members, 6);
    }

    #[test]
    fn test_longest_common_prefix() {
        let members = vec!["app.db.models".to_string(), "app.db.session".to_string(), "app.db.base".to_string()];
        assert_eq!(longest_common_prefix(&members), Some("app.db".to_string()));
    }
}
