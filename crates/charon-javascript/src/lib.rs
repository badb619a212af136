use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language as TsLanguage, Parser, Query, QueryCursor, StreamingIterator};

use charon_core::analyzer::{LanguageAnalyzer, ParseOutcome, ParsedFile};
use charon_core::project::ProjectContext;
use charon_core::stdlib;
use charon_core::types::*;

/// JavaScript/JSX language analyzer using tree-sitter.
pub struct JavaScriptAnalyzer {
    language: TsLanguage,
    class_query: Query,
    function_query: Query,
    import_query: Query,
    require_query: Query,
}

impl JavaScriptAnalyzer {
    pub fn new() -> Result<Self> {
        let language: TsLanguage = tree_sitter_javascript::LANGUAGE.into();

        let class_query = Query::new(&language, r#"(class_declaration name: (identifier) @name)"#)
            .context("failed to compile class query")?;

        let function_query = Query::new(
            &language,
            r#"
            [
              (function_declaration name: (identifier) @name)
              (generator_function_declaration name: (identifier) @name)
            ]
            "#,
        )
        .context("failed to compile function query")?;

        let import_query = Query::new(
            &language,
            r#"
            [
              (import_statement source: (string) @path)
              (export_statement source: (string) @path)
              (call_expression
                function: (import)
                arguments: (arguments (string) @path))
            ]
            "#,
        )
        .context("failed to compile import query")?;

        let require_query = Query::new(
            &language,
            r#"
            (call_expression
              function: (identifier) @callee
              arguments: (arguments (string) @path)
              (#eq? @callee "require"))
            "#,
        )
        .context("failed to compile require query")?;

        Ok(Self { language, class_query, function_query, import_query, require_query })
    }
}

impl Default for JavaScriptAnalyzer {
    fn default() -> Self {
        Self::new().expect("built-in tree-sitter-javascript grammar/queries must compile")
    }
}

impl LanguageAnalyzer for JavaScriptAnalyzer {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn file_extensions(&self) -> &[&str] {
        &["js", "jsx", "mjs", "cjs"]
    }

    fn parse_file(&self, path: &Path, content: &str, module_id: &str) -> Result<ParsedFile> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).context("failed to set JavaScript language")?;
        let tree = parser.parse(content, None).context("failed to parse JavaScript file")?;
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

        let mut imports = extract_imports(&self.import_query, parsed);
        imports.extend(extract_requires(&self.require_query, parsed));

        ParseOutcome { nodes, imports, node_kind }
    }

    fn resolve_import(&self, import: &ParsedImport, from_module_id: &str, ctx: &ProjectContext) -> Resolution {
        resolve_js_import(import, from_module_id, ctx)
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

fn extract_requires(query: &Query, parsed: &ParsedFile) -> Vec<ParsedImport> {
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

/// Import resolution for plain JavaScript: no tsconfig aliases, otherwise
/// the same relative-path/`node:`-builtin/external rules as TypeScript.
pub fn resolve_js_import(import: &ParsedImport, from_module_id: &str, ctx: &ProjectContext) -> Resolution {
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

const JS_CANDIDATE_EXTS: &[&str] = &[".js", ".jsx", ".mjs", ".cjs"];

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
    fn test_parse_class_and_function() {
        let analyzer = JavaScriptAnalyzer::new().unwrap();
        let content = r#"
class UserRepository {
    save(user) {}
}

function helper() {
    return 1;
}
"#;
        let path = PathBuf::from("src/domain/user-repo.js");
        let parsed = analyzer.parse_file(&path, content, "src.domain.user-repo").unwrap();
        let outcome = analyzer.extract(&parsed);

        assert!(outcome.nodes.iter().any(|n| n.kind == NodeKind::Class));
        assert!(outcome.nodes.iter().any(|n| n.kind == NodeKind::Function));
        assert_eq!(outcome.node_kind, NodeKind::Class);
    }

    #[test]
    fn test_extract_esm_and_commonjs_imports() {
        let analyzer = JavaScriptAnalyzer::new().unwrap();
        let content = r#"
import { User } from '../domain/user';
const express = require('express');
"#;
        let path = PathBuf::from("src/infrastructure/server.js");
        let parsed = analyzer.parse_file(&path, content, "src.infrastructure.server").unwrap();
        let outcome = analyzer.extract(&parsed);

        let texts: Vec<&str> = outcome.imports.iter().map(|i| i.text.as_str()).collect();
        assert!(texts.contains(&"../domain/user"));
        assert!(texts.contains(&"express"));
    }

    #[test]
    fn test_resolve_relative_import() {
        let analyzer = JavaScriptAnalyzer::new().unwrap();
        let mut ctx = ProjectContext::new(Path::new("."));
        ctx.register_module("src/domain/user.js", "src.domain.user");
        ctx.register_module("src/infrastructure/server.js", "src.infrastructure.server");

        let import = ParsedImport { text: "../domain/user".to_string(), names: vec![], is_relative: true, level: 0, line: 1 };
        assert_eq!(
            analyzer.resolve_import(&import, "src.infrastructure.server", &ctx),
            Resolution::Internal("src.domain.user".to_string())
        );
    }

    #[test]
    fn test_resolve_builtin_and_external() {
        let analyzer = JavaScriptAnalyzer::new().unwrap();
        let ctx = ProjectContext::new(Path::new("."));

        let builtin = ParsedImport { text: "fs".to_string(), names: vec![], is_relative: false, level: 0, line: 1 };
        assert_eq!(analyzer.resolve_import(&builtin, "src.app", &ctx), Resolution::Stdlib("fs".to_string()));

        let external = ParsedImport { text: "express".to_string(), names: vec![], is_relative: false, level: 0, line: 1 };
        assert_eq!(analyzer.resolve_import(&external, "src.app", &ctx), Resolution::External("express".to_string()));
    }
}
