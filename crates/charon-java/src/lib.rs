use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language as TsLanguage, Parser, Query, QueryCursor, StreamingIterator};

use charon_core::analyzer::{LanguageAnalyzer, ParseOutcome, ParsedFile};
use charon_core::project::ProjectContext;
use charon_core::stdlib;
use charon_core::types::*;

/// Java language analyzer using tree-sitter.
pub struct JavaAnalyzer {
    language: TsLanguage,
    interface_query: Query,
    class_query: Query,
    import_query: Query,
}

impl JavaAnalyzer {
    pub fn new() -> Result<Self> {
        let language: TsLanguage = tree_sitter_java::LANGUAGE.into();

        let interface_query = Query::new(&language, r#"(interface_declaration name: (identifier) @name)"#)
            .context("failed to compile interface query")?;

        let class_query = Query::new(&language, r#"(class_declaration name: (identifier) @name)"#)
            .context("failed to compile class query")?;

        let import_query = Query::new(
            &language,
            r#"
            (import_declaration
              [(scoped_identifier) (identifier)] @path)
            "#,
        )
        .context("failed to compile import query")?;

        Ok(Self { language, interface_query, class_query, import_query })
    }
}

impl Default for JavaAnalyzer {
    fn default() -> Self {
        Self::new().expect("built-in tree-sitter-java grammar/queries must compile")
    }
}

impl LanguageAnalyzer for JavaAnalyzer {
    fn language(&self) -> Language {
        Language::Java
    }

    fn file_extensions(&self) -> &[&str] {
        &["java"]
    }

    fn parse_file(&self, path: &Path, content: &str, module_id: &str) -> Result<ParsedFile> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).context("failed to set Java language")?;
        let tree = parser.parse(content, None).context("failed to parse Java file")?;
        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
            module_id: module_id.to_string(),
        })
    }

    fn extract(&self, parsed: &ParsedFile) -> ParseOutcome {
        let mut nodes = Vec::new();
        collect_named(&self.interface_query, parsed, NodeKind::Interface, &mut nodes);
        let has_interface = !nodes.is_empty();
        collect_named(&self.class_query, parsed, NodeKind::Class, &mut nodes);
        let has_class = nodes.iter().any(|n| n.kind == NodeKind::Class);

        let node_kind = if has_interface {
            NodeKind::Interface
        } else if has_class {
            NodeKind::Class
        } else {
            NodeKind::Module
        };
        nodes.insert(0, ParsedNode { module_id: parsed.module_id.clone(), kind: node_kind, line: 1 });

        let imports = extract_imports(&self.import_query, parsed);

        ParseOutcome { nodes, imports, node_kind }
    }

    fn resolve_import(&self, import: &ParsedImport, _from_module_id: &str, ctx: &ProjectContext) -> Resolution {
        let path = import.text.as_str();

        if stdlib::java_stdlib_root(path) {
            return Resolution::Stdlib(path.to_string());
        }

        if path.ends_with(".*") {
            let prefix = path.trim_end_matches(".*");
            if let Some(resolved) = resolve_package_to_module(ctx, prefix) {
                return Resolution::Internal(resolved);
            }
            return Resolution::External(prefix.to_string());
        }

        if let Some(resolved) = resolve_class_to_module(ctx, path) {
            return Resolution::Internal(resolved);
        }

        Resolution::External(path.to_string())
    }
}

fn resolve_package_to_module(ctx: &ProjectContext, prefix: &str) -> Option<String> {
    let with_dot = format!("{prefix}.");
    ctx.project_modules.iter().filter(|m| m.starts_with(&with_dot)).min().cloned()
}

/// Java imports are fully-qualified class names, but a registered module id
/// also carries its source-root prefix (`src.main.java....`), so match by
/// suffix rather than exact equality.
fn resolve_class_to_module(ctx: &ProjectContext, path: &str) -> Option<String> {
    if ctx.project_modules.contains(path) {
        return Some(path.to_string());
    }
    let suffix = format!(".{path}");
    ctx.project_modules.iter().filter(|m| m.ends_with(&suffix)).min().cloned()
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
            let name = raw.rsplit('.').next().unwrap_or(&raw).to_string();
            imports.push(ParsedImport {
                text: raw,
                names: vec![name],
                is_relative: false,
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_java_interface_and_class() {
        let analyzer = JavaAnalyzer::new().unwrap();
        let content = r#"
package com.example.domain.user;

public interface UserRepository {
    void save(User user);
}

public class User {
    private String id;
}
"#;
        let path = PathBuf::from("src/main/java/com/example/domain/user/UserRepository.java");
        let parsed = analyzer.parse_file(&path, content, "src.main.java.com.example.domain.user.UserRepository").unwrap();
        let outcome = analyzer.extract(&parsed);

        assert!(outcome.nodes.iter().any(|n| n.kind == NodeKind::Interface));
        assert!(outcome.nodes.iter().any(|n| n.kind == NodeKind::Class));
        assert_eq!(outcome.node_kind, NodeKind::Interface);
    }

    #[test]
    fn test_extract_imports_skip_java_stdlib() {
        let analyzer = JavaAnalyzer::new().unwrap();
        let content = r#"
package com.example.application;

import java.util.List;
import com.example.domain.user.User;
"#;
        let path = PathBuf::from("src/main/java/com/example/application/UserService.java");
        let parsed = analyzer.parse_file(&path, content, "src.main.java.com.example.application.UserService").unwrap();
        let outcome = analyzer.extract(&parsed);

        let ctx = ProjectContext::new(Path::new("."));
        let resolutions: Vec<Resolution> = outcome.imports.iter().map(|i| analyzer.resolve_import(i, &parsed.module_id, &ctx)).collect();
        assert!(resolutions.contains(&Resolution::Stdlib("java.util.List".to_string())));
        assert!(resolutions.iter().any(|r| matches!(r, Resolution::External(p) if p == "com.example.domain.user.User")));
    }

    #[test]
    fn test_resolve_internal_exact_match() {
        let analyzer = JavaAnalyzer::new().unwrap();
        let mut ctx = ProjectContext::new(Path::new("."));
        ctx.register_module(
            "src/main/java/com/example/domain/user/User.java",
            "src.main.java.com.example.domain.user.User",
        );

        let import = ParsedImport {
            text: "com.example.domain.user.User".to_string(),
            names: vec!["User".to_string()],
            is_relative: false,
            level: 0,
            line: 1,
        };
        assert_eq!(
            analyzer.resolve_import(&import, "anything", &ctx),
            Resolution::Internal("src.main.java.com.example.domain.user.User".to_string())
        );
    }
}
