//! Fitness-history tracking for `--save-history`: one append-only JSONL
//! file per project under `FITNESS_STORAGE_PATH` (default `.charon_fitness`).

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::fitness::FitnessReport;

pub const DEFAULT_STORAGE_DIR: &str = ".charon_fitness";
pub const STORAGE_ENV_VAR: &str = "FITNESS_STORAGE_PATH";

pub fn storage_root() -> PathBuf {
    std::env::var(STORAGE_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_DIR))
}

/// A snapshot of one `fitness-check` run, appended to a project's history file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessSnapshot {
    pub timestamp: String,
    pub git_commit: Option<String>,
    pub git_branch: Option<String>,
    pub report: FitnessReport,
}

/// Trend comparing the current run against the last recorded snapshot.
#[derive(Debug, Clone)]
pub struct FitnessTrend {
    pub previous_errors: usize,
    pub current_errors: usize,
    pub previous_warnings: usize,
    pub current_warnings: usize,
    pub newly_failing: bool,
}

fn history_path(storage_root: &Path, project_name: &str) -> PathBuf {
    storage_root.join(project_name).join("fitness_history.jsonl")
}

/// Append a fitness-check run to `<storage_root>/<project_name>/fitness_history.jsonl`.
pub fn save_history(storage_root: &Path, project_name: &str, repo_dir: &Path, report: &FitnessReport) -> Result<PathBuf> {
    let path = history_path(storage_root, project_name);
    let dir = path.parent().expect("history path always has a parent");
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let snapshot = FitnessSnapshot {
        timestamp: Utc::now().to_rfc3339(),
        git_commit: get_git_commit(repo_dir),
        git_branch: get_git_branch(repo_dir),
        report: report.clone(),
    };

    let line = serde_json::to_string(&snapshot).context("failed to serialize fitness snapshot")?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").context("failed to write fitness snapshot")?;
    Ok(path)
}

/// Compare the current report against the last recorded snapshot, if any.
pub fn check_trend(storage_root: &Path, project_name: &str, current: &FitnessReport) -> Result<Option<FitnessTrend>> {
    let path = history_path(storage_root, project_name);
    if !path.exists() {
        return Ok(None);
    }
    let Some(last) = load_last_snapshot(&path)? else {
        return Ok(None);
    };

    Ok(Some(FitnessTrend {
        previous_errors: last.report.errors,
        current_errors: current.errors,
        previous_warnings: last.report.warnings,
        current_warnings: current.warnings,
        newly_failing: last.report.passed && !current.passed,
    }))
}

fn load_last_snapshot(path: &Path) -> Result<Option<FitnessSnapshot>> {
    let file = std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = std::io::BufReader::new(file);

    let mut last = None;
    for line in reader.lines() {
        let line = line.context("failed to read line from fitness history")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<FitnessSnapshot>(trimmed) {
            Ok(snapshot) => last = Some(snapshot),
            Err(e) => eprintln!("warning: skipping malformed fitness-history line: {e}"),
        }
    }
    Ok(last)
}

fn get_git_commit(repo_dir: &Path) -> Option<String> {
    run_git(repo_dir, &["rev-parse", "HEAD"])
}

fn get_git_branch(repo_dir: &Path) -> Option<String> {
    run_git(repo_dir, &["rev-parse", "--abbrev-ref", "HEAD"])
}

fn run_git(repo_dir: &Path, args: &[&str]) -> Option<String> {
    std::process::Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .ok()
        .and_then(|o| {
            if o.status.success() {
                Some(String::from_utf8_lossy(&o.stdout).trim().to_string())
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report(errors: usize, warnings: usize) -> FitnessReport {
        FitnessReport {
            passed: errors == 0,
            errors,
            warnings,
            infos: 0,
            violations: vec![],
            unknown_rule_types: vec![],
        }
    }

    #[test]
    fn test_save_and_check_trend_no_regression() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(1, 0);
        save_history(dir.path(), "demo", dir.path(), &report).unwrap();

        let better = sample_report(0, 0);
        let trend = check_trend(dir.path(), "demo", &better).unwrap().unwrap();
        assert_eq!(trend.previous_errors, 1);
        assert_eq!(trend.current_errors, 0);
        assert!(!trend.newly_failing);
    }

    #[test]
    fn test_newly_failing_detected() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(0, 0);
        save_history(dir.path(), "demo", dir.path(), &report).unwrap();

        let worse = sample_report(2, 1);
        let trend = check_trend(dir.path(), "demo", &worse).unwrap().unwrap();
        assert!(trend.newly_failing);
    }

    #[test]
    fn test_no_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(0, 0);
        let trend = check_trend(dir.path(), "demo", &report).unwrap();
        assert!(trend.is_none());
    }
}
