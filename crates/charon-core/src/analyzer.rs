use std::path::{Path, PathBuf};

use anyhow::Result;
use tree_sitter::Tree;

use crate::project::ProjectContext;
use crate::types::{ComplexityMetrics, Language, NodeKind, ParsedImport, ParsedNode, Resolution};

/// A parsed source file with its tree-sitter AST and original content.
pub struct ParsedFile {
    pub path: PathBuf,
    pub tree: Tree,
    pub content: String,
    pub module_id: String,
}

/// Everything a parser extracted from one file, prior to resolution.
pub struct ParseOutcome {
    /// The top-of-file module node plus one node per top-level type/function.
    pub nodes: Vec<ParsedNode>,
    pub imports: Vec<ParsedImport>,
    pub node_kind: NodeKind,
}

/// Trait every per-language analyzer implements.
pub trait LanguageAnalyzer: Send + Sync {
    fn language(&self) -> Language;

    /// File extensions this analyzer handles (without the leading dot).
    fn file_extensions(&self) -> &[&str];

    /// Parse a source file into a [`ParsedFile`]; `module_id` has already
    /// been derived by the driver.
    fn parse_file(&self, path: &Path, content: &str, module_id: &str) -> Result<ParsedFile>;

    /// Extract the module node plus nested type/function nodes and the raw
    /// parsed imports.
    fn extract(&self, parsed: &ParsedFile) -> ParseOutcome;

    /// Resolve one parsed import against the project context.
    fn resolve_import(&self, import: &ParsedImport, from_module_id: &str, ctx: &ProjectContext) -> Resolution;

    /// AST-derived complexity/maintainability metrics for one file, if this
    /// analyzer computes them. Languages without a real walk leave the
    /// driver's all-zero/Grade::A default in place.
    fn complexity(&self, _parsed: &ParsedFile) -> Option<ComplexityMetrics> {
        None
    }
}
