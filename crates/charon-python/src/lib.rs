use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language as TsLanguage, Node, Parser, Query, QueryCursor, StreamingIterator};

use charon_core::analyzer::{LanguageAnalyzer, ParseOutcome, ParsedFile};
use charon_core::complexity::{build_complexity_metrics, halstead_volume};
use charon_core::project::ProjectContext;
use charon_core::stdlib;
use charon_core::types::*;

/// Python language analyzer using tree-sitter. The only analyzer that feeds
/// a real AST-derived [`ComplexityMetrics`] back to the driver; the other
/// languages leave the all-zero default in place.
pub struct PythonAnalyzer {
    language: TsLanguage,
    class_query: Query,
    function_query: Query,
    import_query: Query,
    from_import_query: Query,
}

impl PythonAnalyzer {
    pub fn new() -> Result<Self> {
        let language: TsLanguage = tree_sitter_python::LANGUAGE.into();

        let class_query = Query::new(&language, r#"(class_definition name: (identifier) @name)"#)
            .context("failed to compile class query")?;

        let function_query = Query::new(&language, r#"(function_definition name: (identifier) @name)"#)
            .context("failed to compile function query")?;

        let import_query = Query::new(&language, r#"(import_statement) @stmt"#).context("failed to compile import query")?;

        let from_import_query =
            Query::new(&language, r#"(import_from_statement) @stmt"#).context("failed to compile from-import query")?;

        Ok(Self { language, class_query, function_query, import_query, from_import_query })
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new().expect("built-in tree-sitter-python grammar/queries must compile")
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn file_extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    fn parse_file(&self, path: &Path, content: &str, module_id: &str) -> Result<ParsedFile> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).context("failed to set Python language")?;
        let tree = parser.parse(content, None).context("failed to parse Python file")?;
        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
            module_id: module_id.to_string(),
        })
    }

    fn extract(&self, parsed: &ParsedFile) -> ParseOutcome {
        let mut nodes = Vec::new();
        collect_named(&self.class_query, parsed, NodeKind::Class, &mut nodes);
        let has_class = !nodes.is_empty();
        collect_named(&self.function_query, parsed, NodeKind::Function, &mut nodes);
        let has_function = nodes.iter().any(|n| n.kind == NodeKind::Function);

        let node_kind = if has_class {
            NodeKind::Class
        } else if has_function {
            NodeKind::Function
        } else {
            NodeKind::Module
        };
        nodes.insert(0, ParsedNode { module_id: parsed.module_id.clone(), kind: node_kind, line: 1 });

        let mut imports = extract_plain_imports(&self.import_query, parsed);
        imports.extend(extract_from_imports(&self.from_import_query, parsed));

        ParseOutcome { nodes, imports, node_kind }
    }

    fn resolve_import(&self, import: &ParsedImport, from_module_id: &str, ctx: &ProjectContext) -> Resolution {
        if import.is_relative {
            let candidate = resolve_relative_candidate(from_module_id, import.level, &import.text);
            return Resolution::Internal(candidate);
        }

        let top_level = import.text.split('.').next().unwrap_or(&import.text);
        if stdlib::is_python_stdlib(top_level) {
            return Resolution::Stdlib(top_level.to_string());
        }

        if ctx.has_module_or_parent(&import.text) {
            return Resolution::Internal(import.text.clone());
        }
        if ctx.has_prefix_match(&import.text) {
            return Resolution::Internal(import.text.clone());
        }

        Resolution::External(top_level.to_string())
    }

    fn complexity(&self, parsed: &ParsedFile) -> Option<ComplexityMetrics> {
        Some(compute_complexity(parsed))
    }
}

/// `from . import x` / `from ..pkg.sub import y` resolution. `level` dots
/// strip that many trailing segments off the *current module's own* id to
/// find its containing package, then `text` (possibly empty) is appended.
///
/// This treats the current module's containing package as simply its id
/// with the last segment dropped, which is imprecise for a file that is
/// itself a package's `__init__.py`: `derive_module_id` collapses
/// `pkg/sub/__init__.py` down to `pkg.sub`, indistinguishable here from a
/// plain module `pkg/sub.py`, so a relative import inside that `__init__.py`
/// can resolve one package level too high.
fn resolve_relative_candidate(from_module_id: &str, level: u32, text: &str) -> String {
    let segments: Vec<&str> = if from_module_id.is_empty() { vec![] } else { from_module_id.split('.').collect() };
    let keep = segments.len().saturating_sub(level as usize);
    let base = segments[..keep].join(".");

    if text.is_empty() {
        base
    } else if base.is_empty() {
        text.to_string()
    } else {
        format!("{base}.{text}")
    }
}

fn collect_named(query: &Query, parsed: &ParsedFile, kind: NodeKind, nodes: &mut Vec<ParsedNode>) {
    let mut cursor = QueryCursor::new();
    let name_idx = query.capture_names().iter().position(|n| *n == "name").unwrap_or(0);
    let mut matches = cursor.matches(query, parsed.tree.root_node(), parsed.content.as_bytes());
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index as usize != name_idx {
                continue;
            }
            let line = capture.node.start_position().row + 1;
            nodes.push(ParsedNode { module_id: parsed.module_id.clone(), kind, line });
        }
    }
}

fn extract_plain_imports(query: &Query, parsed: &ParsedFile) -> Vec<ParsedImport> {
    let mut imports = Vec::new();
    let mut cursor = QueryCursor::new();
    let stmt_idx = query.capture_names().iter().position(|n| *n == "stmt").unwrap_or(0);
    let mut matches = cursor.matches(query, parsed.tree.root_node(), parsed.content.as_bytes());
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index as usize != stmt_idx {
                continue;
            }
            let line = capture.node.start_position().row + 1;
            let mut cursor = capture.node.walk();
            for child in capture.node.children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => {
                        let text = node_text(child, &parsed.content);
                        imports.push(ParsedImport { text, names: vec![], is_relative: false, level: 0, line });
                    }
                    "aliased_import" => {
                        if let Some(name_node) = child.child_by_field_name("name") {
                            let text = node_text(name_node, &parsed.content);
                            let alias = child
                                .child_by_field_name("alias")
                                .map(|a| node_text(a, &parsed.content))
                                .into_iter()
                                .collect();
                            imports.push(ParsedImport { text, names: alias, is_relative: false, level: 0, line });
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    imports
}

fn extract_from_imports(query: &Query, parsed: &ParsedFile) -> Vec<ParsedImport> {
    let mut imports = Vec::new();
    let mut cursor = QueryCursor::new();
    let stmt_idx = query.capture_names().iter().position(|n| *n == "stmt").unwrap_or(0);
    let mut matches = cursor.matches(query, parsed.tree.root_node(), parsed.content.as_bytes());
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index as usize != stmt_idx {
                continue;
            }
            let stmt = capture.node;
            let line = stmt.start_position().row + 1;
            let Some(module_node) = stmt.child_by_field_name("module_name") else { continue };

            let (is_relative, level, text) = if module_node.kind() == "relative_import" {
                let raw = node_text(module_node, &parsed.content);
                let dots = raw.chars().take_while(|c| *c == '.').count() as u32;
                let rest = raw.trim_start_matches('.').to_string();
                (true, dots, rest)
            } else {
                (false, 0, node_text(module_node, &parsed.content))
            };

            let mut names = Vec::new();
            let mut names_cursor = stmt.walk();
            for child in stmt.children(&mut names_cursor) {
                if child.id() == module_node.id() {
                    continue;
                }
                collect_import_list_names(child, &parsed.content, &mut names);
            }

            imports.push(ParsedImport { text, names, is_relative, level, line });
        }
    }
    imports
}

fn collect_import_list_names(node: Node, source: &str, names: &mut Vec<String>) {
    match node.kind() {
        "wildcard_import" => names.push("*".to_string()),
        "dotted_name" => names.push(node_text(node, source)),
        "aliased_import" => {
            if let Some(alias) = node.child_by_field_name("alias") {
                names.push(node_text(alias, source));
            } else if let Some(name) = node.child_by_field_name("name") {
                names.push(node_text(name, source));
            }
        }
        "import_list" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_import_list_names(child, source, names);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_import_list_names(child, source, names);
            }
        }
    }
}

fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "with_statement",
    "boolean_operator",
    "conditional_expression",
    "assert_statement",
];

const LOGICAL_LINE_KINDS: &[&str] = &[
    "expression_statement",
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "with_statement",
    "try_statement",
    "except_clause",
    "function_definition",
    "class_definition",
    "return_statement",
    "import_statement",
    "import_from_statement",
    "assert_statement",
    "raise_statement",
    "pass_statement",
    "break_statement",
    "continue_statement",
    "global_statement",
    "nonlocal_statement",
    "delete_statement",
];

const OPERATOR_KINDS: &[&str] = &[
    "+", "-", "*", "/", "//", "%", "**", "@", "==", "!=", "<", ">", "<=", ">=", "=", "+=", "-=", "*=", "/=", "//=",
    "%=", "**=", "&=", "|=", "^=", ">>=", "<<=", ":=", "and", "or", "not", "in", "is", "if", "elif", "else", "for",
    "while", "return", "def", "class", "import", "from", "as", "try", "except", "finally", "with", "lambda", "yield",
    "assert", "raise", "del", "global", "nonlocal", "&", "|", "^", "~", ">>", "<<",
];

const OPERAND_KINDS: &[&str] = &["identifier", "integer", "float", "string", "true", "false", "none"];

/// Walks the whole file once, counting per-function cyclomatic complexity
/// (branch node kinds + 1) and whole-file Halstead operator/operand tallies,
/// feeding both into [`build_complexity_metrics`].
fn compute_complexity(parsed: &ParsedFile) -> ComplexityMetrics {
    let root = parsed.tree.root_node();
    let source = parsed.content.as_str();

    let mut functions = Vec::new();
    collect_function_complexity(root, source, &mut functions);

    let mut distinct_operators = HashSet::new();
    let mut distinct_operands = HashSet::new();
    let mut total_operators = 0usize;
    let mut total_operands = 0usize;
    walk_halstead(root, source, &mut distinct_operators, &mut distinct_operands, &mut total_operators, &mut total_operands);
    let volume = halstead_volume(distinct_operators.len(), distinct_operands.len(), total_operators, total_operands);

    let source_lines = source.lines().count().max(1);
    let comment_lines = count_comment_lines(root);
    let logical_lines = count_kind_occurrences(root, LOGICAL_LINE_KINDS).max(1);
    let lines_of_code = source_lines.saturating_sub(blank_line_count(source));

    build_complexity_metrics(functions, lines_of_code, logical_lines, source_lines, comment_lines, volume)
}

fn collect_function_complexity(node: Node, source: &str, out: &mut Vec<FunctionComplexity>) {
    if node.kind() == "function_definition" {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, source))
            .unwrap_or_else(|| "<anonymous>".to_string());
        let line = node.start_position().row + 1;
        let complexity = 1 + count_kind_occurrences(node, BRANCH_KINDS) as u32;
        out.push(FunctionComplexity { name, complexity, line });
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_function_complexity(child, source, out);
    }
}

fn count_kind_occurrences(node: Node, kinds: &[&str]) -> usize {
    let mut count = if kinds.contains(&node.kind()) { 1 } else { 0 };
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        count += count_kind_occurrences(child, kinds);
    }
    count
}

fn count_comment_lines(node: Node) -> usize {
    let mut count = if node.kind() == "comment" { 1 } else { 0 };
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        count += count_comment_lines(child);
    }
    count
}

fn blank_line_count(source: &str) -> usize {
    source.lines().filter(|l| l.trim().is_empty()).count()
}

fn walk_halstead(
    node: Node,
    source: &str,
    distinct_operators: &mut HashSet<String>,
    distinct_operands: &mut HashSet<String>,
    total_operators: &mut usize,
    total_operands: &mut usize,
) {
    let kind = node.kind();
    if OPERATOR_KINDS.contains(&kind) {
        *total_operators += 1;
        distinct_operators.insert(kind.to_string());
    } else if OPERAND_KINDS.contains(&kind) {
        *total_operands += 1;
        distinct_operands.insert(node_text(node, source));
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_halstead(child, source, distinct_operators, distinct_operands, total_operators, total_operands);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_extracts_class_and_function() {
        let analyzer = PythonAnalyzer::new().unwrap();
        let content = r#"
class UserRepository:
    def save(self, user):
        pass

def helper():
    return 1
"#;
        let path = PathBuf::from("app/domain/user.py");
        let parsed = analyzer.parse_file(&path, content, "app.domain.user").unwrap();
        let outcome = analyzer.extract(&parsed);

        assert!(outcome.nodes.iter().any(|n| n.kind == NodeKind::Class));
        assert!(outcome.nodes.iter().any(|n| n.kind == NodeKind::Function));
        assert_eq!(outcome.node_kind, NodeKind::Class);
    }

    #[test]
    fn test_extract_plain_and_aliased_imports() {
        let analyzer = PythonAnalyzer::new().unwrap();
        let content = "import os\nimport numpy as np\n";
        let path = PathBuf::from("app/main.py");
        let parsed = analyzer.parse_file(&path, content, "app.main").unwrap();
        let outcome = analyzer.extract(&parsed);

        assert!(outcome.imports.iter().any(|i| i.text == "os"));
        assert!(outcome.imports.iter().any(|i| i.text == "numpy" && i.names == vec!["np".to_string()]));
    }

    #[test]
    fn test_extract_from_import_with_names() {
        let analyzer = PythonAnalyzer::new().unwrap();
        let content = "from app.domain.user import User, UserRepository\n";
        let path = PathBuf::from("app/application/service.py");
        let parsed = analyzer.parse_file(&path, content, "app.application.service").unwrap();
        let outcome = analyzer.extract(&parsed);

        let import = outcome.imports.iter().find(|i| i.text == "app.domain.user").unwrap();
        assert!(!import.is_relative);
        assert_eq!(import.names, vec!["User".to_string(), "UserRepository".to_string()]);
    }

    #[test]
    fn test_extract_relative_from_import() {
        let analyzer = PythonAnalyzer::new().unwrap();
        let content = "from ..domain import user\nfrom . import config\n";
        let path = PathBuf::from("app/application/service.py");
        let parsed = analyzer.parse_file(&path, content, "app.application.service").unwrap();
        let outcome = analyzer.extract(&parsed);

        let deep = outcome.imports.iter().find(|i| i.text == "domain").unwrap();
        assert!(deep.is_relative);
        assert_eq!(deep.level, 2);

        let same_package = outcome.imports.iter().find(|i| i.text.is_empty()).unwrap();
        assert!(same_package.is_relative);
        assert_eq!(same_package.level, 1);
        assert_eq!(same_package.names, vec!["config".to_string()]);
    }

    #[test]
    fn test_resolve_relative_import() {
        let analyzer = PythonAnalyzer::new().unwrap();
        let ctx = ProjectContext::new(Path::new("."));

        let deep = ParsedImport { text: "domain".to_string(), names: vec![], is_relative: true, level: 2, line: 1 };
        assert_eq!(
            analyzer.resolve_import(&deep, "app.application.service", &ctx),
            Resolution::Internal("app.domain".to_string())
        );

        let same_package = ParsedImport {
            text: String::new(),
            names: vec!["config".to_string()],
            is_relative: true,
            level: 1,
            line: 1,
        };
        assert_eq!(
            analyzer.resolve_import(&same_package, "app.application.service", &ctx),
            Resolution::Internal("app.application".to_string())
        );
    }

    #[test]
    fn test_resolve_stdlib_and_external() {
        let analyzer = PythonAnalyzer::new().unwrap();
        let ctx = ProjectContext::new(Path::new("."));

        let stdlib_import = ParsedImport { text: "os.path".to_string(), names: vec![], is_relative: false, level: 0, line: 1 };
        assert_eq!(analyzer.resolve_import(&stdlib_import, "app.main", &ctx), Resolution::Stdlib("os".to_string()));

        let external = ParsedImport { text: "requests".to_string(), names: vec![], is_relative: false, level: 0, line: 1 };
        assert_eq!(
            analyzer.resolve_import(&external, "app.main", &ctx),
            Resolution::External("requests".to_string())
        );
    }

    #[test]
    fn test_resolve_internal_via_parent_and_prefix() {
        let analyzer = PythonAnalyzer::new().unwrap();
        let mut ctx = ProjectContext::new(Path::new("."));
        ctx.register_module("app/domain/user.py", "app.domain.user");

        let package_import = ParsedImport { text: "app.domain".to_string(), names: vec![], is_relative: false, level: 0, line: 1 };
        assert_eq!(
            analyzer.resolve_import(&package_import, "app.main", &ctx),
            Resolution::Internal("app.domain".to_string())
        );

        let submodule_import =
            ParsedImport { text: "app.domain.user.helpers".to_string(), names: vec![], is_relative: false, level: 0, line: 1 };
        assert_eq!(
            analyzer.resolve_import(&submodule_import, "app.main", &ctx),
            Resolution::Internal("app.domain.user.helpers".to_string())
        );
    }

    #[test]
    fn test_complexity_counts_branches() {
        let analyzer = PythonAnalyzer::new().unwrap();
        let content = r#"
def risky(x):
    if x > 0:
        for i in range(x):
            if i % 2 == 0:
                print(i)
    else:
        return None
"#;
        let path = PathBuf::from("app/risky.py");
        let parsed = analyzer.parse_file(&path, content, "app.risky").unwrap();
        let metrics = analyzer.complexity(&parsed).unwrap();

        assert_eq!(metrics.function_count, 1);
        assert!(metrics.functions[0].complexity >= 3);
        assert!(metrics.error.is_none());
    }
}
