use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One of the six languages the analyzer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    Rust,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::Rust => "rust",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" => Ok(Language::JavaScript),
            "typescript" | "ts" => Ok(Language::TypeScript),
            "go" | "golang" => Ok(Language::Go),
            "java" => Ok(Language::Java),
            "rust" | "rs" => Ok(Language::Rust),
            _ => Err(anyhow::anyhow!("unknown language: {s}")),
        }
    }
}

/// Extension -> language lookup, the fixed table from the data model.
pub fn language_for_extension(ext: &str) -> Option<Language> {
    match ext {
        "py" | "pyi" => Some(Language::Python),
        "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
        "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
        "go" => Some(Language::Go),
        "java" => Some(Language::Java),
        "rs" => Some(Language::Rust),
        _ => None,
    }
}

/// The kind of a node emitted by a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Module,
    Class,
    Interface,
    Function,
    Component,
    Hook,
    Service,
    Library,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Function => "function",
            NodeKind::Component => "component",
            NodeKind::Hook => "hook",
            NodeKind::Service => "service",
            NodeKind::Library => "library",
        };
        write!(f, "{s}")
    }
}

/// Whether a graph node is part of the scanned project or a resolved
/// third-party dependency sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Internal,
    ThirdParty,
}

/// Metadata attached to every internal module node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub language: Language,
    pub file_path: PathBuf,
    pub service: Option<String>,
    pub node_kind: NodeKind,
}

/// A single parsed import statement, prior to resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedImport {
    /// Raw import text/module path as it appears in source (e.g. `./utils`, `os.path`, `crate::foo`).
    pub text: String,
    /// Imported names, empty for bare `import x` / module-level imports.
    pub names: Vec<String>,
    pub is_relative: bool,
    /// Only meaningful for Python: number of leading dots.
    pub level: u32,
    pub line: usize,
}

/// The outcome of resolving a [`ParsedImport`] against a project context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Internal(String),
    External(String),
    Stdlib(String),
}

/// A node awaiting insertion into the dependency graph: either the
/// top-of-file module node, or a type/function definition discovered inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedNode {
    pub module_id: String,
    pub kind: NodeKind,
    pub line: usize,
}

/// Severity used for both refactoring suggestions and fitness violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            _ => Err(anyhow::anyhow!("unknown severity: {s}")),
        }
    }
}

/// Letter grade bucket used for both complexity and maintainability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
    /// Complexity/maintainability unavailable (analysis failure).
    Unknown,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
            Grade::F => "F",
            Grade::Unknown => "-",
        };
        write!(f, "{s}")
    }
}

/// Severity tier for a node's hot-zone score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotZoneSeverity {
    Critical,
    Warning,
    Info,
    Ok,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotZone {
    pub is_hot_zone: bool,
    pub severity: HotZoneSeverity,
    pub score: f64,
    pub reason: String,
}

/// Per-function complexity record, populated for Python modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionComplexity {
    pub name: String,
    pub complexity: u32,
    pub line: usize,
}

/// Complexity metrics for a single file. Non-Python files get the
/// all-zero/Grade::A default via [`ComplexityMetrics::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    pub cyclomatic_complexity: f64,
    pub max_complexity: u32,
    pub maintainability_index: f64,
    pub lines_of_code: usize,
    pub logical_lines: usize,
    pub source_lines: usize,
    pub comment_lines: usize,
    pub function_count: usize,
    pub complexity_grade: Grade,
    pub maintainability_grade: Grade,
    pub functions: Vec<FunctionComplexity>,
    pub error: Option<String>,
}

impl Default for ComplexityMetrics {
    fn default() -> Self {
        Self {
            cyclomatic_complexity: 0.0,
            max_complexity: 0,
            maintainability_index: 100.0,
            lines_of_code: 0,
            logical_lines: 0,
            source_lines: 0,
            comment_lines: 0,
            function_count: 0,
            complexity_grade: Grade::A,
            maintainability_grade: Grade::A,
            functions: Vec::new(),
            error: None,
        }
    }
}

/// Complexity grade from average cyclomatic complexity: standard McCabe buckets.
pub fn complexity_grade(avg_complexity: f64) -> Grade {
    let c = avg_complexity.round() as i64;
    match c {
        i64::MIN..=5 => Grade::A,
        6..=10 => Grade::B,
        11..=20 => Grade::C,
        21..=30 => Grade::D,
        31..=40 => Grade::E,
        _ => Grade::F,
    }
}

/// Maintainability grade from a 0-100 maintainability index.
pub fn maintainability_grade(mi: f64) -> Grade {
    if mi >= 85.0 {
        Grade::A
    } else if mi >= 65.0 {
        Grade::B
    } else if mi >= 40.0 {
        Grade::C
    } else if mi >= 20.0 {
        Grade::D
    } else {
        Grade::F
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_extension() {
        assert_eq!(language_for_extension("py"), Some(Language::Python));
        assert_eq!(language_for_extension("tsx"), Some(Language::TypeScript));
        assert_eq!(language_for_extension("mjs"), Some(Language::JavaScript));
        assert_eq!(language_for_extension("rs"), Some(Language::Rust));
        assert_eq!(language_for_extension("txt"), None);
    }

    #[test]
    fn test_severity_ordering_and_parse() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("bogus".parse::<Severity>().is_err());
    }

    #[test]
    fn test_complexity_grade_buckets() {
        assert_eq!(complexity_grade(3.0), Grade::A);
        assert_eq!(complexity_grade(8.0), Grade::B);
        assert_eq!(complexity_grade(15.0), Grade::C);
        assert_eq!(complexity_grade(25.0), Grade::D);
        assert_eq!(complexity_grade(35.0), Grade::E);
        assert_eq!(complexity_grade(50.0), Grade::F);
    }

    #[test]
    fn test_maintainability_grade_buckets() {
        assert_eq!(maintainability_grade(90.0), Grade::A);
        assert_eq!(maintainability_grade(70.0), Grade::B);
        assert_eq!(maintainability_grade(50.0), Grade::C);
        assert_eq!(maintainability_grade(25.0), Grade::D);
        assert_eq!(maintainability_grade(10.0), Grade::F);
    }
}
