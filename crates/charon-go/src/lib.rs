use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language as TsLanguage, Parser, Query, QueryCursor, StreamingIterator};

use charon_core::analyzer::{LanguageAnalyzer, ParseOutcome, ParsedFile};
use charon_core::project::ProjectContext;
use charon_core::stdlib;
use charon_core::types::*;

/// Go language analyzer using tree-sitter.
pub struct GoAnalyzer {
    language: TsLanguage,
    interface_query: Query,
    struct_query: Query,
    func_query: Query,
    import_query: Query,
}

impl GoAnalyzer {
    pub fn new() -> Result<Self> {
        let language: TsLanguage = tree_sitter_go::LANGUAGE.into();

        let interface_query = Query::new(
            &language,
            r#"
            (type_declaration
              (type_spec
                name: (type_identifier) @name
                type: (interface_type)))
            "#,
        )
        .context("failed to compile interface query")?;

        let struct_query = Query::new(
            &language,
            r#"
            (type_declaration
              (type_spec
                name: (type_identifier) @name
                type: (struct_type)))
            "#,
        )
        .context("failed to compile struct query")?;

        let func_query = Query::new(
            &language,
            r#"
            (function_declaration name: (identifier) @name)
            "#,
        )
        .context("failed to compile function query")?;

        let import_query = Query::new(
            &language,
            r#"
            (import_spec path: (interpreted_string_literal) @path)
            "#,
        )
        .context("failed to compile import query")?;

        Ok(Self { language, interface_query, struct_query, func_query, import_query })
    }
}

impl Default for GoAnalyzer {
    fn default() -> Self {
        Self::new().expect("built-in tree-sitter-go grammar/queries must compile")
    }
}

impl LanguageAnalyzer for GoAnalyzer {
    fn language(&self) -> Language {
        Language::Go
    }

    fn file_extensions(&self) -> &[&str] {
        &["go"]
    }

    fn parse_file(&self, path: &Path, content: &str, module_id: &str) -> Result<ParsedFile> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).context("failed to set Go language")?;
        let tree = parser.parse(content, None).context("failed to parse Go file")?;
        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
            module_id: module_id.to_string(),
        })
    }

    fn extract(&self, parsed: &ParsedFile) -> ParseOutcome {
        let mut nodes = Vec::new();
        let mut has_interface = false;
        let mut has_struct = false;

        collect_named(&self.interface_query, parsed, NodeKind::Interface, &mut nodes);
        has_interface |= !nodes.is_empty();
        collect_named(&self.struct_query, parsed, NodeKind::Class, &mut nodes);
        has_struct |= nodes.iter().any(|n| n.kind == NodeKind::Class);
        collect_named(&self.func_query, parsed, NodeKind::Function, &mut nodes);

        let node_kind = if has_interface {
            NodeKind::Interface
        } else if has_struct {
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
        let first_segment = path.split('/').next().unwrap_or(path);

        if stdlib::is_go_stdlib(first_segment) {
            return Resolution::Stdlib(first_segment.to_string());
        }

        if let Some(module) = &ctx.manifests.go_module {
            if let Some(rest) = path.strip_prefix(module.as_str()) {
                let rest = rest.trim_start_matches('/');
                let candidate = rest.replace('/', ".");
                if let Some(resolved) = resolve_package_to_module(ctx, &candidate) {
                    return Resolution::Internal(resolved);
                }
                return Resolution::Internal(candidate);
            }
        }

        Resolution::External(path.to_string())
    }
}

/// A Go import path names a package (directory), not a single file. Pick the
/// lexicographically-first registered module under that package as the
/// edge target, so the per-file graph still gets one concrete node.
fn resolve_package_to_module(ctx: &ProjectContext, candidate: &str) -> Option<String> {
    if ctx.project_modules.contains(candidate) {
        return Some(candidate.to_string());
    }
    let prefix = format!("{candidate}.");
    ctx.project_modules.iter().filter(|m| m.starts_with(&prefix)).min().cloned()
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
            let path = raw.trim_matches('"').to_string();
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            imports.push(ParsedImport {
                text: path,
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
    fn test_parse_interface_and_struct() {
        let analyzer = GoAnalyzer::new().unwrap();
        let content = r#"
package user

type UserRepository interface {
    Save(user *User) error
}

type User struct {
    ID   string
    Name string
}
"#;
        let path = PathBuf::from("internal/domain/user/entity.go");
        let parsed = analyzer.parse_file(&path, content, "internal.domain.user.entity").unwrap();
        let outcome = analyzer.extract(&parsed);

        assert!(outcome.nodes.iter().any(|n| n.kind == NodeKind::Interface));
        assert!(outcome.nodes.iter().any(|n| n.kind == NodeKind::Class));
        assert_eq!(outcome.node_kind, NodeKind::Interface);
    }

    #[test]
    fn test_extract_imports() {
        let analyzer = GoAnalyzer::new().unwrap();
        let content = r#"
package user

import (
    "fmt"
    "github.com/example/app/internal/infrastructure/postgres"
)

func main() {
    fmt.Println("hello")
}
"#;
        let path = PathBuf::from("internal/domain/user/service.go");
        let parsed = analyzer.parse_file(&path, content, "internal.domain.user.service").unwrap();
        let outcome = analyzer.extract(&parsed);

        assert_eq!(outcome.imports.len(), 2);
        let paths: Vec<&str> = outcome.imports.iter().map(|i| i.text.as_str()).collect();
        assert!(paths.contains(&"fmt"));
        assert!(paths.contains(&"github.com/example/app/internal/infrastructure/postgres"));
    }

    #[test]
    fn test_resolve_stdlib_and_external() {
        let analyzer = GoAnalyzer::new().unwrap();
        let ctx = ProjectContext::new(Path::new("."));

        let stdlib_import = ParsedImport { text: "fmt".to_string(), names: vec!["fmt".to_string()], is_relative: false, level: 0, line: 1 };
        assert_eq!(analyzer.resolve_import(&stdlib_import, "main", &ctx), Resolution::Stdlib("fmt".to_string()));

        let external_import = ParsedImport {
            text: "github.com/pkg/errors".to_string(),
            names: vec!["errors".to_string()],
            is_relative: false,
            level: 0,
            line: 1,
        };
        assert_eq!(
            analyzer.resolve_import(&external_import, "main", &ctx),
            Resolution::External("github.com/pkg/errors".to_string())
        );
    }

    #[test]
    fn test_resolve_internal_via_go_module() {
        let analyzer = GoAnalyzer::new().unwrap();
        let mut ctx = ProjectContext::new(Path::new("."));
        ctx.manifests.go_module = Some("github.com/example/app".to_string());
        ctx.register_module("internal/domain/user/entity.go", "internal.domain.user.entity");

        let import = ParsedImport {
            text: "github.com/example/app/internal/domain/user".to_string(),
            names: vec!["user".to_string()],
            is_relative: false,
            level: 0,
            line: 1,
        };
        assert_eq!(
            analyzer.resolve_import(&import, "cmd.main", &ctx),
            Resolution::Internal("internal.domain.user.entity".to_string())
        );
    }
}
