use serde::Serialize;

use charon_core::fitness::FitnessReport;
use charon_core::metrics::AnalysisResult;

/// Format a full analysis report as JSON.
pub fn format_report(result: &AnalysisResult, compact: bool) -> String {
    if compact {
        serde_json::to_string(result).expect("AnalysisResult should be serializable")
    } else {
        serde_json::to_string_pretty(result).expect("AnalysisResult should be serializable")
    }
}

/// Wrapper around a [`FitnessReport`] for `fitness-check --json-output`.
#[derive(Debug, Serialize)]
pub struct FitnessCheckOutput<'a> {
    #[serde(flatten)]
    pub report: &'a FitnessReport,
    pub exit_code: i32,
}

/// Format a fitness-check result as JSON. Returns (json_string, exit_code).
pub fn format_fitness_check(report: &FitnessReport) -> (String, i32) {
    let exit_code = if report.passed { 0 } else { 1 };
    let output = FitnessCheckOutput { report, exit_code };
    let json = serde_json::to_string_pretty(&output).expect("FitnessCheckOutput should be serializable");
    (json, exit_code)
}
