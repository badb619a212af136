use colored::Colorize;

use charon_core::fitness::FitnessReport;
use charon_core::metrics::AnalysisResult;
use charon_core::types::Severity;

/// Format a full analysis report for terminal output.
pub fn format_report(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let gm = &result.global_metrics;

    out.push_str(&format!("\n{}\n", "Charon - Dependency Graph Analysis".bold()));
    out.push_str(&format!("{}\n\n", "=".repeat(40)));

    out.push_str(&format!(
        "{}: {} internal, {} third-party\n",
        "Nodes".bold(),
        gm.internal_count,
        gm.third_party_count
    ));
    out.push_str(&format!(
        "  Avg afferent:      {:.2}\n  Avg efferent:      {:.2}\n  Avg complexity:    {:.2}\n  Avg maintainability: {:.2}\n",
        gm.avg_afferent, gm.avg_efferent, gm.avg_complexity, gm.avg_maintainability
    ));

    if !gm.totals_by_kind.is_empty() {
        out.push_str(&format!("\n{}\n", "Nodes by kind".bold()));
        let mut kinds: Vec<_> = gm.totals_by_kind.iter().collect();
        kinds.sort_by_key(|(k, _)| (*k).clone());
        for (kind, count) in kinds {
            out.push_str(&format!("    {kind}: {count}\n"));
        }
    }

    out.push_str(&format!("\n{}\n", "Coupling".bold()));
    out.push_str(&format!(
        "  High-coupling threshold: Ce >= {:.1}\n  High-coupling files: {}\n",
        gm.coupling_threshold,
        gm.high_coupling_files.len()
    ));
    for id in gm.high_coupling_files.iter().take(10) {
        out.push_str(&format!("    {id}\n"));
    }

    if gm.circular_dependencies.is_empty() {
        out.push_str(&format!("\n{}\n", "No circular dependencies found!".green().bold()));
    } else {
        out.push_str(&format!(
            "\n{} ({}{})\n",
            "Circular dependencies".red().bold(),
            gm.circular_dependencies.len(),
            if gm.cycles_truncated { ", truncated" } else { "" }
        ));
        for cycle in &gm.circular_dependencies {
            out.push_str(&format!("    {}\n", cycle.join(" -> ")));
        }
    }

    if !gm.hot_zone_files.is_empty() {
        out.push_str(&format!("\n{}\n", "Hot zones".yellow().bold()));
        for entry in gm.hot_zone_files.iter().take(10) {
            out.push_str(&format!(
                "    {} [{:?}] score={:.1} - {}\n",
                entry.module_id, entry.hot_zone.severity, entry.hot_zone.score, entry.hot_zone.reason
            ));
        }
    }

    if !gm.clusters.is_empty() {
        out.push_str(&format!("\n{}\n", "Clusters".bold()));
        for cluster in &gm.clusters {
            out.push_str(&format!("    cluster {} ({} members)\n", cluster.id, cluster.members.len()));
        }
    }

    if !gm.package_suggestions.is_empty() {
        out.push_str(&format!("\n{}\n", "Package suggestions".bold()));
        for suggestion in &gm.package_suggestions {
            out.push_str(&format!("    {}: {}\n", suggestion.suggested_package_name, suggestion.reason));
        }
    }

    if !gm.refactoring_suggestions.is_empty() {
        out.push_str(&format!(
            "\n{} ({} found)\n",
            "Refactoring suggestions".bold(),
            gm.refactoring_summary.total
        ));
        for s in &gm.refactoring_suggestions {
            let severity_str = severity_label(s.severity);
            out.push_str(&format!("    {} [{:?}] {} - {}\n", severity_str, s.kind, s.module_id, s.description));
        }
    }

    if !result.warnings.is_empty() {
        out.push_str(&format!("\n{} ({})\n", "Warnings".yellow().bold(), result.warnings.len()));
        for w in &result.warnings {
            out.push_str(&format!("    {w}\n"));
        }
    }

    out.push('\n');
    out
}

fn severity_label(severity: Severity) -> String {
    match severity {
        Severity::Error => "ERROR".red().bold().to_string(),
        Severity::Warning => "WARN".yellow().bold().to_string(),
        Severity::Info => "INFO".blue().bold().to_string(),
    }
}

/// Format a fitness-check report for terminal output. Returns (text, exit_code).
pub fn format_fitness_check(report: &FitnessReport) -> (String, i32) {
    let mut out = String::new();

    if report.violations.is_empty() {
        out.push_str(&format!("{}\n", "No fitness violations found!".green().bold()));
    } else {
        out.push_str(&format!(
            "{} ({} found)\n{}\n",
            "Fitness violations".bold(),
            report.violations.len(),
            "-".repeat(40)
        ));
        for v in &report.violations {
            out.push_str(&format!("\n  {} [{}] {}\n", severity_label(v.severity), v.rule, v.message));
            if !v.modules.is_empty() {
                out.push_str(&format!("    modules: {}\n", v.modules.join(", ")));
            }
        }
    }

    if !report.unknown_rule_types.is_empty() {
        out.push_str(&format!(
            "\n{}: {}\n",
            "Unknown rule types skipped".yellow(),
            report.unknown_rule_types.join(", ")
        ));
    }

    out.push_str(&format!(
        "\n{}: {} errors, {} warnings, {} infos\n",
        "Summary".bold(),
        report.errors,
        report.warnings,
        report.infos
    ));

    if report.passed {
        out.push_str(&format!("{}\n", "CHECK PASSED".green().bold()));
    } else {
        out.push_str(&format!("{}\n", "CHECK FAILED".red().bold()));
    }

    let exit_code = if report.passed { 0 } else { 1 };
    (out, exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use charon_core::fitness::FitnessViolation;

    fn sample_report(passed: bool) -> FitnessReport {
        let violations = if passed {
            vec![]
        } else {
            vec![FitnessViolation {
                rule: "no-ui-to-db".to_string(),
                severity: Severity::Error,
                message: "ui.widget imports forbidden target db.session".to_string(),
                modules: vec!["ui.widget".to_string(), "db.session".to_string()],
            }]
        };
        FitnessReport {
            passed,
            errors: if passed { 0 } else { 1 },
            warnings: 0,
            infos: 0,
            violations,
            unknown_rule_types: vec![],
        }
    }

    #[test]
    fn test_format_fitness_check_passed() {
        let report = sample_report(true);
        let (text, code) = format_fitness_check(&report);
        assert_eq!(code, 0);
        assert!(text.contains("CHECK PASSED"));
    }

    #[test]
    fn test_format_fitness_check_failed() {
        let report = sample_report(false);
        let (text, code) = format_fitness_check(&report);
        assert_eq!(code, 1);
        assert!(text.contains("CHECK FAILED"));
        assert!(text.contains("no-ui-to-db"));
    }
}
