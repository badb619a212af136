//! Refactoring-opportunity detectors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::graph::DependencyGraph;
use crate::metrics::NodeMetrics;
use crate::types::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefactoringKind {
    GodObject,
    FeatureEnvy,
    InappropriateIntimacy,
    PotentialDeadCode,
    HubModule,
    CircularDependency,
    UnstableDependency,
}

impl RefactoringKind {
    fn label(self) -> &'static str {
        match self {
            RefactoringKind::GodObject => "god_object",
            RefactoringKind::FeatureEnvy => "feature_envy",
            RefactoringKind::InappropriateIntimacy => "inappropriate_intimacy",
            RefactoringKind::PotentialDeadCode => "potential_dead_code",
            RefactoringKind::HubModule => "hub_module",
            RefactoringKind::CircularDependency => "circular_dependency",
            RefactoringKind::UnstableDependency => "unstable_dependency",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefactoringSuggestion {
    pub kind: RefactoringKind,
    pub module_id: String,
    pub severity: Severity,
    pub description: String,
    pub related: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefactoringSummary {
    pub total: usize,
    pub by_kind: HashMap<String, usize>,
}

fn god_object(graph: &DependencyGraph, metrics: &HashMap<String, NodeMetrics>) -> Vec<RefactoringSuggestion> {
    let mut out = Vec::new();
    for node in graph.internal_nodes() {
        let Some(m) = metrics.get(&node.id) else { continue };
        if m.efferent >= 25 {
            out.push(RefactoringSuggestion {
                kind: RefactoringKind::GodObject,
                module_id: node.id.clone(),
                severity: Severity::Error,
                description: format!("depends on {} other modules; split responsibilities", m.efferent),
                related: Vec::new(),
            });
        } else if m.efferent >= 15 {
            out.push(RefactoringSuggestion {
                kind: RefactoringKind::GodObject,
                module_id: node.id.clone(),
                severity: Severity::Warning,
                description: format!("depends on {} other modules; consider splitting", m.efferent),
                related: Vec::new(),
            });
        }
    }
    out
}

fn feature_envy(graph: &DependencyGraph) -> Vec<RefactoringSuggestion> {
    let mut out = Vec::new();
    for node in graph.internal_nodes() {
        let Some(idx) = graph.node_index(&node.id) else { continue };
        let successors: Vec<_> = graph.successors(idx).collect();
        if successors.len() < 5 {
            continue;
        }
        let total: usize = successors
            .iter()
            .filter_map(|s| graph.edge(idx, *s).map(|e| e.weight))
            .sum();
        if total == 0 {
            continue;
        }
        for succ in &successors {
            let Some(edge) = graph.edge(idx, *succ) else { continue };
            if edge.weight as f64 / total as f64 >= 0.5 {
                let target = &graph.node(*succ).id;
                out.push(RefactoringSuggestion {
                    kind: RefactoringKind::FeatureEnvy,
                    module_id: node.id.clone(),
                    severity: Severity::Warning,
                    description: format!("more than half of its imports point at `{target}`"),
                    related: vec![target.clone()],
                });
            }
        }
    }
    out
}

fn inappropriate_intimacy(graph: &DependencyGraph) -> Vec<RefactoringSuggestion> {
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for (from, to, _) in graph.edges_with_nodes() {
        if !from.is_internal() || !to.is_internal() || from.id >= to.id {
            continue;
        }
        let (Some(from_idx), Some(to_idx)) = (graph.node_index(&from.id), graph.node_index(&to.id)) else {
            continue;
        };
        if graph.has_edge(to_idx, from_idx) {
            let key = (from.id.clone(), to.id.clone());
            if !seen.insert(key) {
                continue;
            }
            out.push(RefactoringSuggestion {
                kind: RefactoringKind::InappropriateIntimacy,
                module_id: from.id.clone(),
                severity: Severity::Error,
                description: format!("bidirectionally coupled with `{}`", to.id),
                related: vec![to.id.clone()],
            });
        }
    }
    out
}

fn potential_dead_code(graph: &DependencyGraph, metrics: &HashMap<String, NodeMetrics>) -> Vec<RefactoringSuggestion> {
    let mut out = Vec::new();
    for node in graph.internal_nodes() {
        let Some(m) = metrics.get(&node.id) else { continue };
        if m.afferent == 0 && m.efferent > 0 {
            out.push(RefactoringSuggestion {
                kind: RefactoringKind::PotentialDeadCode,
                module_id: node.id.clone(),
                severity: Severity::Info,
                description: "nothing in the project imports this module".to_string(),
                related: Vec::new(),
            });
        }
    }
    out
}

fn hub_module(graph: &DependencyGraph, metrics: &HashMap<String, NodeMetrics>) -> Vec<RefactoringSuggestion> {
    let mut out = Vec::new();
    for node in graph.internal_nodes() {
        let Some(m) = metrics.get(&node.id) else { continue };
        if m.afferent >= 15 {
            out.push(RefactoringSuggestion {
                kind: RefactoringKind::HubModule,
                module_id: node.id.clone(),
                severity: Severity::Warning,
                description: format!("{} modules depend on this one; a change here ripples widely", m.afferent),
                related: Vec::new(),
            });
        } else if m.afferent >= 10 {
            out.push(RefactoringSuggestion {
                kind: RefactoringKind::HubModule,
                module_id: node.id.clone(),
                severity: Severity::Info,
                description: format!("{} modules depend on this one", m.afferent),
                related: Vec::new(),
            });
        }
    }
    out
}

fn circular_dependency(cycles: &[Vec<String>]) -> Vec<RefactoringSuggestion> {
    cycles
        .iter()
        .filter(|cycle| (2..=5).contains(&cycle.len()))
        .map(|cycle| RefactoringSuggestion {
            kind: RefactoringKind::CircularDependency,
            module_id: cycle[0].clone(),
            severity: Severity::Error,
            description: format!("part of a {}-module dependency cycle", cycle.len()),
            related: cycle[1..].to_vec(),
        })
        .collect()
}

fn unstable_dependency(graph: &DependencyGraph, metrics: &HashMap<String, NodeMetrics>) -> Vec<RefactoringSuggestion> {
    let mut out = Vec::new();
    for node in graph.internal_nodes() {
        let Some(idx) = graph.node_index(&node.id) else { continue };
        let Some(m) = metrics.get(&node.id) else { continue };
        if m.instability >= 0.5 {
            continue;
        }
        for succ in graph.successors(idx) {
            let succ_node = graph.node(succ);
            let Some(succ_metrics) = metrics.get(&succ_node.id) else { continue };
            if succ_metrics.instability - m.instability > 0.3 {
                out.push(RefactoringSuggestion {
                    kind: RefactoringKind::UnstableDependency,
                    module_id: node.id.clone(),
                    severity: Severity::Warning,
                    description: format!(
                        "stable module (I={:.3}) depends on a far less stable one `{}` (I={:.3})",
                        m.instability, succ_node.id, succ_metrics.instability
                    ),
                    related: vec![succ_node.id.clone()],
                });
            }
        }
    }
    out
}

const SEVERITY_RANK: fn(Severity) -> u8 = |s| match s {
    Severity::Error => 2,
    Severity::Warning => 1,
    Severity::Info => 0,
};

pub fn detect_refactorings(
    graph: &DependencyGraph,
    metrics: &HashMap<String, NodeMetrics>,
    cycles: &[Vec<String>],
) -> (Vec<RefactoringSuggestion>, RefactoringSummary) {
    let mut all = Vec::new();
    all.extend(god_object(graph, metrics));
    all.extend(feature_envy(graph));
    all.extend(inappropriate_intimacy(graph));
    all.extend(potential_dead_code(graph, metrics));
    all.extend(hub_module(graph, metrics));
    all.extend(circular_dependency(cycles));
    all.extend(unstable_dependency(graph, metrics));

    all.sort_by(|a, b| {
        SEVERITY_RANK(b.severity)
            .cmp(&SEVERITY_RANK(a.severity))
            .then_with(|| a.module_id.cmp(&b.module_id))
    });

    let mut by_kind: HashMap<String, usize> = HashMap::new();
    for s in &all {
        *by_kind.entry(s.kind.label().to_string()).or_insert(0) += 1;
    }
    let summary = RefactoringSummary {
        total: all.len(),
        by_kind,
    };
    (all, summary)
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
    fn test_inappropriate_intimacy_detected() {
        let mut g = DependencyGraph::new();
        let a = g.add_internal_node("a", meta());
        let b = g.add_internal_node("b", meta());
        g.add_edge(a, b, &[]);
        g.add_edge(b, a, &[]);
        let findings = inappropriate_intimacy(&g);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_potential_dead_code() {
        let mut g = DependencyGraph::new();
        let a = g.add_internal_node("a", meta());
        let b = g.add_internal_node("b", meta());
        g.add_edge(a, b, &[]);
        let mut metrics = HashMap::new();
        metrics.insert(
            "a".to_string(),
            NodeMetrics {
                afferent: 0,
                efferent: 1,
                instability: 1.0,
                is_circular: false,
                is_high_coupling: false,
                complexity: Default::default(),
                hot_zone: crate::metrics::compute_hot_zone(0.0, 1),
            },
        );
        metrics.insert(
            "b".to_string(),
            NodeMetrics {
                afferent: 1,
                efferent: 0,
                instability: 0.0,
                is_circular: false,
                is_high_coupling: false,
                complexity: Default::default(),
                hot_zone: crate::metrics::compute_hot_zone(0.0, 1),
            },
        );
        let findings = potential_dead_code(&g, &metrics);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].module_id, "a");
    }
}
