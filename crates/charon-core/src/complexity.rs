//! Shared complexity/maintainability grading glue. The Python-only
//! AST walk that counts decision points and Halstead operands lives in the
//! Python analyzer crate; this module holds the language-independent math
//! and the non-Python default.

use crate::types::{ComplexityMetrics, FunctionComplexity, Grade};

/// Maintainability index from Halstead volume, average cyclomatic
/// complexity, logical lines of code and comment ratio, following the
/// same normalized 0-171 formula radon's `mi_visit` uses.
pub fn maintainability_index(volume: f64, avg_complexity: f64, lloc: usize, comment_ratio: f64) -> f64 {
    if volume <= 0.0 || lloc == 0 {
        return 100.0;
    }
    let lloc = lloc as f64;
    let raw = 171.0 - 5.2 * volume.ln() - 0.23 * avg_complexity - 16.2 * lloc.ln()
        + 50.0 * (2.4 * std::f64::consts::PI * comment_ratio).sqrt().sin();
    let normalized = (raw * 100.0 / 171.0).clamp(0.0, 100.0);
    normalized
}

/// Halstead volume from distinct/total operator and operand counts.
pub fn halstead_volume(distinct_operators: usize, distinct_operands: usize, total_operators: usize, total_operands: usize) -> f64 {
    let vocabulary = (distinct_operators + distinct_operands) as f64;
    let length = (total_operators + total_operands) as f64;
    if vocabulary <= 1.0 || length == 0.0 {
        return 0.0;
    }
    length * vocabulary.log2()
}

#[allow(clippy::too_many_arguments)]
pub fn build_complexity_metrics(
    functions: Vec<FunctionComplexity>,
    lines_of_code: usize,
    logical_lines: usize,
    source_lines: usize,
    comment_lines: usize,
    volume: f64,
) -> ComplexityMetrics {
    let function_count = functions.len();
    let total_complexity: u32 = functions.iter().map(|f| f.complexity).sum();
    let max_complexity = functions.iter().map(|f| f.complexity).max().unwrap_or(0);
    let avg_complexity = if function_count > 0 {
        total_complexity as f64 / function_count as f64
    } else {
        1.0
    };
    let comment_ratio = if lines_of_code > 0 {
        comment_lines as f64 / lines_of_code as f64
    } else {
        0.0
    };
    let mi = maintainability_index(volume, avg_complexity, logical_lines.max(1), comment_ratio);

    ComplexityMetrics {
        cyclomatic_complexity: avg_complexity,
        max_complexity,
        maintainability_index: mi,
        lines_of_code,
        logical_lines,
        source_lines,
        comment_lines,
        function_count,
        complexity_grade: crate::types::complexity_grade(avg_complexity),
        maintainability_grade: crate::types::maintainability_grade(mi),
        functions,
        error: None,
    }
}

pub fn failed_complexity(error: String) -> ComplexityMetrics {
    ComplexityMetrics {
        complexity_grade: Grade::Unknown,
        maintainability_grade: Grade::Unknown,
        error: Some(error),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maintainability_index_bounds() {
        let mi = maintainability_index(500.0, 5.0, 50, 0.1);
        assert!((0.0..=100.0).contains(&mi));
    }

    #[test]
    fn test_zero_volume_defaults_to_perfect_score() {
        assert_eq!(maintainability_index(0.0, 0.0, 0, 0.0), 100.0);
    }

    #[test]
    fn test_build_complexity_metrics_empty_functions() {
        let m = build_complexity_metrics(vec![], 10, 8, 10, 1, 0.0);
        assert_eq!(m.function_count, 0);
        assert_eq!(m.complexity_grade, Grade::A);
    }

    #[test]
    fn test_failed_complexity_grade_unknown() {
        let m = failed_complexity("parse error".to_string());
        assert_eq!(m.complexity_grade, Grade::Unknown);
        assert!(m.error.is_some());
    }
}
