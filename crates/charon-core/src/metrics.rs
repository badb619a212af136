//! The metrics engine: per-node coupling/instability/hot-zone and
//! the global aggregates derived from them.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::clustering::{Cluster, PackageSuggestion};
use crate::graph::DependencyGraph;
use crate::refactoring::{RefactoringSuggestion, RefactoringSummary};
use crate::types::{ComplexityMetrics, Grade, HotZone, HotZoneSeverity};

/// Per-node metrics populated after the graph is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub afferent: usize,
    pub efferent: usize,
    pub instability: f64,
    pub is_circular: bool,
    pub is_high_coupling: bool,
    pub complexity: ComplexityMetrics,
    pub hot_zone: HotZone,
}

/// Round to 3 decimal places, matching the instability rounding rule.
fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

pub fn compute_instability(afferent: usize, efferent: usize) -> f64 {
    let total = afferent + efferent;
    if total == 0 {
        0.0
    } else {
        round3(efferent as f64 / total as f64)
    }
}

/// Hot-zone score. `c` = complexity, `k` = Ca+Ce (total coupling).
pub fn compute_hot_zone(c: f64, k: usize) -> HotZone {
    let c_norm = (c / 20.0).min(1.0);
    let k_norm = (k as f64 / 10.0).min(1.0);
    let score = (c_norm * 0.6 + k_norm * 0.4) * 100.0;

    let complexity_high = c >= 10.0;
    let coupling_high = k >= 5;
    let is_hot_zone = complexity_high && coupling_high;

    let (severity, reason) = if is_hot_zone && score >= 75.0 {
        (
            HotZoneSeverity::Critical,
            format!("Critical: high complexity ({c:.1}) and high coupling ({k})"),
        )
    } else if is_hot_zone {
        (
            HotZoneSeverity::Warning,
            format!("Elevated complexity ({c:.1}) and coupling ({k})"),
        )
    } else if complexity_high {
        (
            HotZoneSeverity::Info,
            format!("Complex code ({c:.1}) but manageable coupling"),
        )
    } else if coupling_high {
        (
            HotZoneSeverity::Info,
            format!("High coupling ({k}) but low complexity"),
        )
    } else {
        (
            HotZoneSeverity::Ok,
            "Healthy complexity and coupling levels".to_string(),
        )
    };

    HotZone {
        is_hot_zone,
        severity,
        score: round3(score),
        reason,
    }
}

/// High-coupling threshold: a nearest-rank percentile with midpoint
/// interpolation at the boundary, so that exactly
/// `floor(n * (100-P)/100)` nodes strictly exceed or meet the cutoff.
pub fn high_coupling_threshold(efferent_values: &[usize], percentile: u8) -> f64 {
    if efferent_values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = efferent_values.iter().map(|&v| v as f64).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = (percentile as f64 / 100.0) * n as f64;
    let idx = (rank.ceil() as usize).min(n);
    if idx == 0 {
        sorted[0]
    } else if idx >= n {
        sorted[n - 1]
    } else {
        (sorted[idx - 1] + sorted[idx]) / 2.0
    }
}

pub fn compute_node_metrics(
    graph: &DependencyGraph,
    idx: NodeIndex,
    threshold: f64,
    circular_members: &std::collections::HashSet<String>,
    complexity: ComplexityMetrics,
) -> NodeMetrics {
    let afferent = graph.afferent_coupling(idx);
    let efferent = graph.efferent_coupling(idx);
    let instability = compute_instability(afferent, efferent);
    let is_circular = circular_members.contains(&graph.node(idx).id);
    let is_high_coupling = efferent as f64 >= threshold;
    let hot_zone = compute_hot_zone(complexity.cyclomatic_complexity, afferent + efferent);

    NodeMetrics {
        afferent,
        efferent,
        instability,
        is_circular,
        is_high_coupling,
        complexity,
        hot_zone,
    }
}

/// Global metrics and graph-wide derived results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalMetrics {
    pub totals_by_kind: HashMap<String, usize>,
    pub internal_count: usize,
    pub third_party_count: usize,
    pub avg_afferent: f64,
    pub avg_efferent: f64,
    pub avg_complexity: f64,
    pub avg_maintainability: f64,
    pub circular_dependencies: Vec<Vec<String>>,
    pub cycles_truncated: bool,
    pub high_coupling_files: Vec<String>,
    pub coupling_threshold: f64,
    pub hot_zone_files: Vec<HotZoneEntry>,
    pub clusters: Vec<Cluster>,
    pub package_suggestions: Vec<PackageSuggestion>,
    pub refactoring_suggestions: Vec<RefactoringSuggestion>,
    pub refactoring_summary: RefactoringSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotZoneEntry {
    pub module_id: String,
    pub hot_zone: HotZone,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[allow(clippy::too_many_arguments)]
pub fn build_global_metrics(
    graph: &DependencyGraph,
    node_metrics: &HashMap<String, NodeMetrics>,
    totals_by_kind: HashMap<String, usize>,
    circular_dependencies: Vec<Vec<String>>,
    cycles_truncated: bool,
    coupling_threshold: f64,
    clusters: Vec<Cluster>,
    package_suggestions: Vec<PackageSuggestion>,
    refactoring_suggestions: Vec<RefactoringSuggestion>,
    refactoring_summary: RefactoringSummary,
) -> GlobalMetrics {
    let internal: Vec<&str> = graph.internal_nodes().map(|n| n.id.as_str()).collect();
    let internal_count = internal.len();
    let third_party_count = graph.nodes().filter(|n| !n.is_internal()).count();

    let afferents: Vec<f64> = internal
        .iter()
        .filter_map(|id| node_metrics.get(*id).map(|m| m.afferent as f64))
        .collect();
    let efferents: Vec<f64> = internal
        .iter()
        .filter_map(|id| node_metrics.get(*id).map(|m| m.efferent as f64))
        .collect();
    let complexities: Vec<f64> = internal
        .iter()
        .filter_map(|id| node_metrics.get(*id).map(|m| m.complexity.cyclomatic_complexity))
        .collect();
    let maintainabilities: Vec<f64> = internal
        .iter()
        .filter_map(|id| node_metrics.get(*id).map(|m| m.complexity.maintainability_index))
        .collect();

    let high_coupling_files: Vec<String> = internal
        .iter()
        .filter(|id| node_metrics.get(**id).is_some_and(|m| m.is_high_coupling))
        .map(|id| id.to_string())
        .collect();

    let mut hot_zone_files: Vec<HotZoneEntry> = internal
        .iter()
        .filter_map(|id| {
            node_metrics.get(*id).and_then(|m| {
                if m.hot_zone.is_hot_zone {
                    Some(HotZoneEntry {
                        module_id: id.to_string(),
                        hot_zone: m.hot_zone.clone(),
                    })
                } else {
                    None
                }
            })
        })
        .collect();
    hot_zone_files.sort_by(|a, b| b.hot_zone.score.partial_cmp(&a.hot_zone.score).unwrap());

    GlobalMetrics {
        totals_by_kind,
        internal_count,
        third_party_count,
        avg_afferent: mean(&afferents),
        avg_efferent: mean(&efferents),
        avg_complexity: mean(&complexities),
        avg_maintainability: mean(&maintainabilities),
        circular_dependencies,
        cycles_truncated,
        high_coupling_files,
        coupling_threshold,
        hot_zone_files,
        clusters,
        package_suggestions,
        refactoring_suggestions,
        refactoring_summary,
    }
}

/// A single graph node as it appears in the serialized analysis output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub node_type: crate::types::NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<crate::types::ModuleMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<NodeMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: String,
    pub to: String,
    pub imports: Vec<String>,
    pub weight: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRecord {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// The full serializable output of one `analyze` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub graph: GraphRecord,
    pub global_metrics: GlobalMetrics,
    pub warnings: Vec<String>,
}

pub fn grade_for_complexity_mean(c: f64) -> Grade {
    crate::types::complexity_grade(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_instability() {
        assert_eq!(compute_instability(0, 0), 0.0);
        assert_eq!(compute_instability(0, 5), 1.0);
        assert_eq!(compute_instability(5, 0), 0.0);
        assert_eq!(compute_instability(1, 1), 0.5);
    }

    #[test]
    fn test_hot_zone_critical() {
        let hz = compute_hot_zone(20.0, 20);
        assert!(hz.is_hot_zone);
        assert_eq!(hz.score, 100.0);
        assert!(matches!(hz.severity, HotZoneSeverity::Critical));
    }

    #[test]
    fn test_hot_zone_ok() {
        let hz = compute_hot_zone(2.0, 2);
        assert!(!hz.is_hot_zone);
        assert!(matches!(hz.severity, HotZoneSeverity::Ok));
    }

    #[test]
    fn test_hot_zone_info_complexity_only() {
        let hz = compute_hot_zone(15.0, 2);
        assert!(!hz.is_hot_zone);
        assert!(matches!(hz.severity, HotZoneSeverity::Info));
    }

    #[test]
    fn test_high_coupling_threshold_s4_scenario() {
        // 12 internal modules with the efferent-coupling distribution from
        // the seed test suite; only Ce=10 and Ce=20 should clear the 80th
        // percentile cutoff.
        let ce_values = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 20];
        let threshold = high_coupling_threshold(&ce_values, 80);
        assert!(threshold > 9.0 && threshold <= 10.0, "threshold={threshold}");
        let qualifying: Vec<_> = ce_values.iter().filter(|&&v| v as f64 >= threshold).collect();
        assert_eq!(qualifying, vec![&10, &20]);
    }
}
