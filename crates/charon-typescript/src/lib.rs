use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language as TsLanguage, Parser, Query, QueryCursor, StreamingIterator};

use charon_core::analyzer::{LanguageAnalyzer, ParseOutcome, ParsedFile};
use charon_core::project::ProjectContext;
use charon_core::stdlib;
use charon_core::types::*;

/// Holds queries compiled for a specific TypeScript dialect.
struct QuerySet {
    interface_query: Query,
    class_query: Query,
    import_query: Query,
}

const INTERFACE_QUERY_SRC: &str = r#"(interface_declaration name: (type_identifier) @name)"#;
const CLASS_QUERY_SRC: &str = r#"(class_declaration name: (type_identifier) @name)"#;
const IMPORT_QUERY_SRC: &str = r#"
[
  (import_statement source: (string) @path)
  (export_statement source: (string) @path)
  (call_expression
    function: (import)
    arguments: (arguments (string) @path))
]
"#;

fn compile_queries(language: &TsLanguage) -> Result<QuerySet> {
    Ok(QuerySet {
        interface_query: Query::new(language, INTERFACE_QUERY_SRC).context("failed to compile interface query")?,
        class_query: Query::new(language, CLASS_QUERY_SRC).context("failed to compile class query")?,
        import_query: Query::new(language, IMPORT_QUERY_SRC).context("failed to compile import query")?,
    })
}

/// TypeScript/TSX language analyzer using tree-sitter.
pub struct TypeScriptAnalyzer {
    ts_language: TsLanguage,
    tsx_language: TsLanguage,
    ts_queries: QuerySet,
    tsx_queries: QuerySet,
}

impl TypeScriptAnalyzer {
    pub fn new() -> Result<Self> {
        let ts_language: TsLanguage = tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into();
        let tsx_language: TsLanguage = tree_sitter_typescript::LANGUAGE_TSX.into();

        let ts_queries = compile_queries(&ts_language)?;
        let tsx_queries = compile_queries(&tsx_language)?;

        Ok(Self { ts_language, tsx_language, ts_queries, tsx_queries })
    }

    fn language_for_file(&self, path: &Path) -> &TsLanguage {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") => &self.tsx_language,
            _ => &self.ts_language,
        }
    }

    fn queries_for_file(&self, path: &Path) -> &QuerySet {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") => &self.tsx_queries,
            _ => &self.ts_queries,
        }
    }
}

impl Default for TypeScriptAnalyzer {
    fn default() -> Self {
        Self::new().expect("built-in tree-sitter-typescript grammars/queries must compile")
    }
}

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn file_extensions(&self) -> &[&str] {
        &["ts", "tsx", "mts", "cts"]
    }

    fn parse_file(&self, path: &Path, content: &str, module_id: &str) -> Result<ParsedFile> {
        let language = self.language_for_file(path);
        let mut parser = Parser::new();
        parser.set_language(language).context("failed to set TypeScript language")?;
        let tree = parser.parse(content, None).context("failed to parse TypeScript file")?;
        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
            module_id: module_id.to_string(),
        })
    }

    fn extract(&self, parsed: &ParsedFile) -> ParseOutcome {
        let mut nodes = Vec::new();
        if parsed.path.to_string_lossy().ends_with(".d.ts") {
            nodes.push(ParsedNode { module_id: parsed.module_id.clone(), kind: NodeKind::Module, line: 1 });
            return ParseOutcome { nodes, imports: Vec::new(), node_kind: NodeKind::Module };
        }

        let queries = self.queries_for_file(&parsed.path);
        collect_named(&queries.interface_query, parsed, NodeKind::Interface, &mut nodes);
        let has_interface = !nodes.is_empty();
        collect_named(&queries.class_query, parsed, NodeKind::Class, &mut nodes);
        let has_class = nodes.iter().any(|n| n.kind == NodeKind::Class);

        let node_kind = if has_interface {
            NodeKind::Interface
        } else if has_class {
            NodeKind::Class
        } else {
            NodeKind::Module
        };
        nodes.insert(0, ParsedNode { module_id: parsed.module_id.clone(), kind: node_kind, line: 1 });

        let imports = extract_imports(&queries.import_query, parsed);

        ParseOutcome { nodes, imports, node_kind }
    }

    fn resolve_import(&self, import: &ParsedImport, from_module_id: &str, ctx: &ProjectContext) -> Resolution {
        resolve_js_like_import(import, from_module_id, ctx)
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

fn extract_imports(query: &Query, parsed: &ParsedFile) -> Vec<ParsedImport> {
    let mut imports = Vec::new();
    let mut cursor = QueryCursor::new();
    let path_idx = query.capture_names().iter().position(|n| *n == "path").unwrap_or(0);

    let mut matches = cursor.matches(query, parsed.tree.root_node(), parsed.content.as_bytes());
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index as usize != path_idx {
                continue;
            }
            let node = capture.node;
            let raw = node_text(node, &parsed.content);
            let text = raw.trim_matches('"').trim_matches('\'').to_string();
            let is_relative = text.starts_with('.');
            imports.push(ParsedImport {
                text: text.clone(),
                names: vec![text],
                is_relative,
                level: 0,
                line: node.start_position().row + 1,
            });
        }
    }
    imports
}

fn node_text(node: tree_sitter::Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

/// Import resolution shared by TypeScript and JavaScript: `node:`/builtin
/// specifiers are stdlib, relative specifiers resolve against the importing
/// file's own directory via `known_paths`, tsconfig/jsconfig path aliases
/// are tried next, and anything left over is an external package.
pub fn resolve_js_like_import(import: &ParsedImport, from_module_id: &str, ctx: &ProjectContext) -> Resolution {
    let text = import.text.as_str();

    if let Some(rest) = text.strip_prefix("node:") {
        return Resolution::Stdlib(rest.to_string());
    }
    let first_segment = text.split('/').next().unwrap_or(text);
    if !import.is_relative && stdlib::is_node_builtin(first_segment) {
        return Resolution::Stdlib(first_segment.to_string());
    }

    if import.is_relative {
        if let Some(from_path) = rel_path_for_module(ctx, from_module_id) {
            let base_dir = Path::new(from_path).parent().unwrap_or_else(|| Path::new(""));
            let joined = join_posix(base_dir, text);
            if let Some(module_id) = resolve_candidate(ctx, &joined) {
                return Resolution::Internal(module_id);
            }
            return Resolution::Internal(joined.replace('/', "."));
        }
        return Resolution::Internal(text.trim_start_matches("./").replace('/', "."));
    }

    if let Some(aliased) = resolve_ts_alias(ctx, text) {
        if let Some(module_id) = resolve_candidate(ctx, &aliased) {
            return Resolution::Internal(module_id);
        }
        return Resolution::Internal(aliased.replace('/', "."));
    }

    Resolution::External(package_name(text))
}

fn rel_path_for_module<'a>(ctx: &'a ProjectContext, module_id: &str) -> Option<&'a str> {
    ctx.path_to_module.iter().find(|(_, m)| m.as_str() == module_id).map(|(p, _)| p.as_str())
}

fn join_posix(base_dir: &Path, relative: &str) -> String {
    let mut parts: Vec<String> = base_dir.to_string_lossy().split('/').filter(|s| !s.is_empty()).map(String::from).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other.to_string()),
        }
    }
    parts.join("/")
}

const JS_CANDIDATE_EXTS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mts", ".cts", ".mjs", ".cjs"];

fn resolve_candidate(ctx: &ProjectContext, base: &str) -> Option<String> {
    if let Some(m) = ctx.path_to_module.get(base) {
        return Some(m.clone());
    }
    for ext in JS_CANDIDATE_EXTS {
        let candidate = format!("{base}{ext}");
        if let Some(m) = ctx.path_to_module.get(&candidate) {
            return Some(m.clone());
        }
    }
    for ext in JS_CANDIDATE_EXTS {
        let candidate = format!("{base}/index{ext}");
        if let Some(m) = ctx.path_to_module.get(&candidate) {
            return Some(m.clone());
        }
    }
    None
}

fn resolve_ts_alias(ctx: &ProjectContext, text: &str) -> Option<String> {
    for (pattern, targets) in &ctx.manifests.ts_aliases.paths {
        let Some(prefix) = pattern.strip_suffix('*') else {
            if pattern == text {
                return targets.first().cloned();
            }
            continue;
        };
        if let Some(rest) = text.strip_prefix(prefix) {
            if let Some(target) = targets.first() {
                let target_prefix = target.strip_suffix('*').unwrap_or(target);
                let base_url = ctx.manifests.ts_aliases.base_url.as_deref().unwrap_or("");
                let base_url = base_url.trim_start_matches("./").trim_matches('/');
                let combined = if base_url.is_empty() {
                    format!("{target_prefix}{rest}")
                } else {
                    format!("{base_url}/{target_prefix}{rest}")
                };
                return Some(combined);
            }
        }
    }
    None
}

fn package_name(text: &str) -> String {
    if text.starts_with('@') {
        let mut parts = text.splitn(3, '/');
        let scope = parts.next().unwrap_or(text);
        let name = parts.next();
        match name {
            Some(n) => format!("{scope}/{n}"),
            None => scope.to_string(),
        }
    } else {
        text.split('/').next().unwrap_or(text).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_typescript_interface_and_class() {
        let analyzer = TypeScriptAnalyzer::new().unwrap();
        let content = r#"
export interface UserRepository {
    save(user: User): Promise<void>;
}

export class PostgresUserRepository implements UserRepository {
    async save(user: User): Promise<void> {}
}
"#;
        let path = PathBuf::from("src/domain/user/user.ts");
        let parsed = analyzer.parse_file(&path, content, "src.domain.user.user").unwrap();
        let outcome = analyzer.extract(&parsed);

        assert!(outcome.nodes.iter().any(|n| n.kind == NodeKind::Interface));
        assert!(outcome.nodes.iter().any(|n| n.kind == NodeKind::Class));
    }

    #[test]
    fn test_extract_imports() {
        let analyzer = TypeScriptAnalyzer::new().unwrap();
        let content = r#"
import { User } from '../domain/user/user';
import { Pool } from 'pg';
"#;
        let path = PathBuf::from("src/infrastructure/postgres/user-repo.ts");
        let parsed = analyzer.parse_file(&path, content, "src.infrastructure.postgres.user-repo").unwrap();
        let outcome = analyzer.extract(&parsed);

        let texts: Vec<&str> = outcome.imports.iter().map(|i| i.text.as_str()).collect();
        assert!(texts.contains(&"../domain/user/user"));
        assert!(texts.contains(&"pg"));
    }

    #[test]
    fn test_resolve_relative_import() {
        let analyzer = TypeScriptAnalyzer::new().unwrap();
        let mut ctx = ProjectContext::new(Path::new("."));
        ctx.register_module("src/domain/user/user.ts", "src.domain.user.user");
        ctx.register_module("src/infrastructure/postgres/user-repo.ts", "src.infrastructure.postgres.user-repo");

        let import = ParsedImport { text: "../../domain/user/user".to_string(), names: vec![], is_relative: true, level: 0, line: 1 };
        assert_eq!(
            analyzer.resolve_import(&import, "src.infrastructure.postgres.user-repo", &ctx),
            Resolution::Internal("src.domain.user.user".to_string())
        );
    }

    #[test]
    fn test_resolve_node_builtin_and_external() {
        let analyzer = TypeScriptAnalyzer::new().unwrap();
        let ctx = ProjectContext::new(Path::new("."));

        let builtin = ParsedImport { text: "fs".to_string(), names: vec![], is_relative: false, level: 0, line: 1 };
        assert_eq!(analyzer.resolve_import(&builtin, "src.app", &ctx), Resolution::Stdlib("fs".to_string()));

        let scoped = ParsedImport { text: "@nestjs/core".to_string(), names: vec![], is_relative: false, level: 0, line: 1 };
        assert_eq!(analyzer.resolve_import(&scoped, "src.app", &ctx), Resolution::External("@nestjs/core".to_string()));
    }

    #[test]
    fn test_resolve_tsconfig_alias() {
        let analyzer = TypeScriptAnalyzer::new().unwrap();
        let mut ctx = ProjectContext::new(Path::new("."));
        ctx.register_module("src/utils/logger.ts", "src.utils.logger");
        ctx.manifests.ts_aliases.base_url = Some(".".to_string());
        ctx.manifests.ts_aliases.paths.insert("@/*".to_string(), vec!["src/*".to_string()]);

        let import = ParsedImport { text: "@/utils/logger".to_string(), names: vec![], is_relative: false, level: 0, line: 1 };
        assert_eq!(
            analyzer.resolve_import(&import, "src.app", &ctx),
            Resolution::Internal("src.utils.logger".to_string())
        );
    }
}
