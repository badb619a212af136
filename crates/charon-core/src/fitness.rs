//! Declarative fitness-rule engine: six rule types, each evaluated against
//! the dependency graph and per-node metrics to produce pass/fail verdicts.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::graph::DependencyGraph;
use crate::metrics::NodeMetrics;
use crate::types::Severity;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FitnessRuleFile {
    pub rules: Vec<FitnessRule>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FitnessRule {
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(flatten)]
    pub params: serde_json::Value,
}

fn default_severity() -> Severity {
    Severity::Error
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessViolation {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessReport {
    pub passed: bool,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub violations: Vec<FitnessViolation>,
    pub unknown_rule_types: Vec<String>,
}

pub struct FitnessContext<'a> {
    pub graph: &'a DependencyGraph,
    pub metrics: &'a HashMap<String, NodeMetrics>,
    pub cycles: &'a [Vec<String>],
}

fn get_str(v: &serde_json::Value, key: &str) -> Option<String> {
    v.get(key).and_then(|x| x.as_str()).map(|s| s.to_string())
}

fn get_f64(v: &serde_json::Value, key: &str) -> Option<f64> {
    v.get(key).and_then(|x| x.as_f64())
}

fn get_usize(v: &serde_json::Value, key: &str) -> Option<usize> {
    v.get(key).and_then(|x| x.as_u64()).map(|x| x as usize)
}

fn eval_import_restriction(rule: &FitnessRule, ctx: &FitnessContext) -> Result<Vec<FitnessViolation>, String> {
    let source_pattern = get_str(&rule.params, "forbidden_source_pattern")
        .ok_or_else(|| "import_restriction requires forbidden_source_pattern".to_string())?;
    let target_pattern = get_str(&rule.params, "forbidden_target_pattern")
        .ok_or_else(|| "import_restriction requires forbidden_target_pattern".to_string())?;
    let source_re = Regex::new(&source_pattern).map_err(|e| e.to_string())?;
    let target_re = Regex::new(&target_pattern).map_err(|e| e.to_string())?;

    let mut violations = Vec::new();
    for (from, to, _) in ctx.graph.edges_with_nodes() {
        if source_re.is_match(&from.id) && target_re.is_match(&to.id) {
            violations.push(FitnessViolation {
                rule: rule.name.clone(),
                severity: rule.severity,
                message: format!("`{}` imports forbidden target `{}`", from.id, to.id),
                modules: vec![from.id.clone(), to.id.clone()],
            });
        }
    }
    Ok(violations)
}

fn compile_module_pattern(rule: &FitnessRule) -> Result<Option<Regex>, String> {
    match get_str(&rule.params, "module_pattern") {
        Some(p) => Regex::new(&p).map(Some).map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

fn eval_max_coupling(rule: &FitnessRule, ctx: &FitnessContext) -> Result<Vec<FitnessViolation>, String> {
    let max_efferent = get_usize(&rule.params, "max_efferent");
    let max_afferent = get_usize(&rule.params, "max_afferent");
    let max_total = get_usize(&rule.params, "max_total");
    if max_efferent.is_none() && max_afferent.is_none() && max_total.is_none() {
        return Err("max_coupling requires max_efferent, max_afferent, and/or max_total".to_string());
    }
    let module_pattern = compile_module_pattern(rule)?;

    let mut violations = Vec::new();
    for node in ctx.graph.internal_nodes() {
        if let Some(re) = &module_pattern {
            if !re.is_match(&node.id) {
                continue;
            }
        }
        let Some(m) = ctx.metrics.get(&node.id) else { continue };
        if let Some(max) = max_efferent {
            if m.efferent > max {
                violations.push(FitnessViolation {
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    message: format!("`{}` has efferent coupling {} (max {})", node.id, m.efferent, max),
                    modules: vec![node.id.clone()],
                });
            }
        }
        if let Some(max) = max_afferent {
            if m.afferent > max {
                violations.push(FitnessViolation {
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    message: format!("`{}` has afferent coupling {} (max {})", node.id, m.afferent, max),
                    modules: vec![node.id.clone()],
                });
            }
        }
        if let Some(max) = max_total {
            let total = m.afferent + m.efferent;
            if total > max {
                violations.push(FitnessViolation {
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    message: format!("`{}` has total coupling {} (max {})", node.id, total, max),
                    modules: vec![node.id.clone()],
                });
            }
        }
    }
    Ok(violations)
}

fn eval_no_circular(rule: &FitnessRule, ctx: &FitnessContext) -> Result<Vec<FitnessViolation>, String> {
    Ok(ctx
        .cycles
        .iter()
        .map(|cycle| FitnessViolation {
            rule: rule.name.clone(),
            severity: rule.severity,
            message: format!("circular dependency: {}", cycle.join(" -> ")),
            modules: cycle.clone(),
        })
        .collect())
}

fn eval_max_third_party_percent(rule: &FitnessRule, ctx: &FitnessContext) -> Result<Vec<FitnessViolation>, String> {
    let max_percent = get_f64(&rule.params, "max_percent")
        .ok_or_else(|| "max_third_party_percent requires max_percent".to_string())?;

    let total_files = ctx.graph.node_count();
    if total_files == 0 {
        return Ok(Vec::new());
    }
    let total_third_party = ctx.graph.nodes().filter(|n| !n.is_internal()).count();
    let percent = total_third_party as f64 / total_files as f64 * 100.0;

    if percent > max_percent {
        Ok(vec![FitnessViolation {
            rule: rule.name.clone(),
            severity: rule.severity,
            message: format!(
                "project is {percent:.1}% third-party ({total_third_party}/{total_files} files, max {max_percent:.1}%)"
            ),
            modules: Vec::new(),
        }])
    } else {
        Ok(Vec::new())
    }
}

fn eval_max_depth(rule: &FitnessRule, ctx: &FitnessContext) -> Result<Vec<FitnessViolation>, String> {
    let max_depth = get_usize(&rule.params, "max_depth").ok_or_else(|| "max_depth requires max_depth".to_string())?;
    let root = get_str(&rule.params, "from");
    let mut violations = Vec::new();
    let roots: Vec<petgraph::graph::NodeIndex> = match &root {
        Some(id) => ctx.graph.node_index(id).into_iter().collect(),
        None => ctx.graph.internal_node_indices().collect(),
    };
    for idx in roots {
        let depths = ctx.graph.bfs_hop_depths(idx);
        for (other, depth) in depths {
            if depth > max_depth {
                let module = ctx.graph.node(other).id.clone();
                violations.push(FitnessViolation {
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    message: format!("`{module}` is {depth} hops away from `{}` (max {max_depth})", ctx.graph.node(idx).id),
                    modules: vec![ctx.graph.node(idx).id.clone(), module],
                });
            }
        }
    }
    Ok(violations)
}

fn eval_max_complexity(rule: &FitnessRule, ctx: &FitnessContext) -> Result<Vec<FitnessViolation>, String> {
    let max_cyclomatic = get_f64(&rule.params, "max_cyclomatic");
    let min_maintainability = get_f64(&rule.params, "min_maintainability");
    if max_cyclomatic.is_none() && min_maintainability.is_none() {
        return Err("max_complexity requires max_cyclomatic and/or min_maintainability".to_string());
    }
    let module_pattern = compile_module_pattern(rule)?;

    let mut violations = Vec::new();
    for node in ctx.graph.internal_nodes() {
        if let Some(re) = &module_pattern {
            if !re.is_match(&node.id) {
                continue;
            }
        }
        let Some(m) = ctx.metrics.get(&node.id) else { continue };
        if let Some(max) = max_cyclomatic {
            if m.complexity.cyclomatic_complexity > max {
                violations.push(FitnessViolation {
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    message: format!(
                        "`{}` has cyclomatic complexity {:.1} (max {max:.1})",
                        node.id, m.complexity.cyclomatic_complexity
                    ),
                    modules: vec![node.id.clone()],
                });
            }
        }
        if let Some(min) = min_maintainability {
            if m.complexity.maintainability_index < min {
                violations.push(FitnessViolation {
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    message: format!(
                        "`{}` has maintainability index {:.1} (min {min:.1})",
                        node.id, m.complexity.maintainability_index
                    ),
                    modules: vec![node.id.clone()],
                });
            }
        }
    }
    Ok(violations)
}

pub fn evaluate_rules(
    rules: &[FitnessRule],
    ctx: &FitnessContext,
    fail_on_error: bool,
    fail_on_warning: bool,
) -> FitnessReport {
    let mut violations = Vec::new();
    let mut unknown_rule_types = Vec::new();

    for rule in rules {
        let result = match rule.rule_type.as_str() {
            "import_restriction" => eval_import_restriction(rule, ctx),
            "max_coupling" => eval_max_coupling(rule, ctx),
            "no_circular" => eval_no_circular(rule, ctx),
            "max_third_party_percent" => eval_max_third_party_percent(rule, ctx),
            "max_depth" => eval_max_depth(rule, ctx),
            "max_complexity" => eval_max_complexity(rule, ctx),
            other => {
                unknown_rule_types.push(other.to_string());
                continue;
            }
        };
        match result {
            Ok(mut v) => violations.append(&mut v),
            Err(e) => violations.push(FitnessViolation {
                rule: rule.name.clone(),
                severity: Severity::Error,
                message: format!("rule configuration error: {e}"),
                modules: Vec::new(),
            }),
        }
    }

    let errors = violations.iter().filter(|v| v.severity == Severity::Error).count();
    let warnings = violations.iter().filter(|v| v.severity == Severity::Warning).count();
    let infos = violations.iter().filter(|v| v.severity == Severity::Info).count();

    let passed = !(fail_on_error && errors > 0) && !(fail_on_warning && warnings > 0);

    FitnessReport {
        passed,
        errors,
        warnings,
        infos,
        violations,
        unknown_rule_types,
    }
}
