use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::Severity;

/// Top-level configuration from `.charon.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub metrics: MetricsSection,
    #[serde(default)]
    pub rules: RulesSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

fn default_languages() -> Vec<String> {
    vec![
        "python".to_string(),
        "javascript".to_string(),
        "typescript".to_string(),
        "go".to_string(),
        "java".to_string(),
        "rust".to_string(),
    ]
}

/// Directories a file provider skips outright (mirrors common build/VCS/
/// dependency/test-fixture noise across all six supported languages).
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    ".git",
    "vendor",
    "__pycache__",
    "venv",
    ".venv",
    "env",
    "coverage",
    ".next",
    "target",
    "out",
    ".cache",
    "bower_components",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "site-packages",
    ".gradle",
    "bin",
    "obj",
    "packages",
    ".nuget",
    "Debug",
    "Release",
    "test",
    "tests",
    "__tests__",
    "spec",
    "specs",
    "fixtures",
    "__fixtures__",
    "mocks",
    "__mocks__",
    "e2e",
    "cypress",
    "playwright",
];

fn default_exclude_patterns() -> Vec<String> {
    SKIP_DIRS.iter().map(|d| format!("**/{d}/**")).collect()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

/// Thresholds feeding the metrics engine and clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSection {
    #[serde(default = "default_percentile")]
    pub high_coupling_percentile: u8,
    #[serde(default = "default_max_cycles")]
    pub max_cycles_reported: usize,
    #[serde(default = "default_cluster_resolution")]
    pub cluster_resolution: f64,
}

fn default_percentile() -> u8 {
    80
}

fn default_max_cycles() -> usize {
    10_000
}

fn default_cluster_resolution() -> f64 {
    1.0
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            high_coupling_percentile: default_percentile(),
            max_cycles_reported: default_max_cycles(),
            cluster_resolution: default_cluster_resolution(),
        }
    }
}

/// Default fitness-gating behavior when not overridden on the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesSection {
    #[serde(default = "default_fail_on")]
    pub fail_on: Severity,
}

fn default_fail_on() -> Severity {
    Severity::Error
}

impl Default for RulesSection {
    fn default() -> Self {
        Self {
            fail_on: default_fail_on(),
        }
    }
}

impl Config {
    /// Load configuration from a `.charon.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `.charon.toml` in the given directory, or fall back to
    /// defaults. A malformed manifest degrades to defaults rather than
    /// aborting analysis.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(".charon.toml");
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Generate default TOML content for `charon init`.
    pub fn default_toml() -> String {
        r#"# Charon dependency-graph analysis configuration

[project]
languages = ["python", "javascript", "typescript", "go", "java", "rust"]
exclude_patterns = ["**/node_modules/**", "**/.git/**", "**/vendor/**", "**/target/**"]

[metrics]
# Top-X% by fan-out qualify as high coupling (80 = top 20%)
high_coupling_percentile = 80
max_cycles_reported = 10000
cluster_resolution = 1.0

[rules]
fail_on = "error"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.project.languages.contains(&"python".to_string()));
        assert_eq!(config.metrics.high_coupling_percentile, 80);
        assert_eq!(config.rules.fail_on, Severity::Error);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[project]
languages = ["python"]

[metrics]
high_coupling_percentile = 90
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project.languages, vec!["python"]);
        assert_eq!(config.metrics.high_coupling_percentile, 90);
        assert_eq!(config.metrics.max_cycles_reported, 10_000);
    }

    #[test]
    fn test_default_toml_is_valid() {
        let toml_str = Config::default_toml();
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.metrics.high_coupling_percentile, 80);
    }
}
