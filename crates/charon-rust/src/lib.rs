use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language as TsLanguage, Parser, Query, QueryCursor, StreamingIterator};

use charon_core::analyzer::{LanguageAnalyzer, ParseOutcome, ParsedFile};
use charon_core::project::ProjectContext;
use charon_core::stdlib;
use charon_core::types::*;

/// Rust language analyzer using tree-sitter.
pub struct RustAnalyzer {
    language: TsLanguage,
    item_query: Query,
    use_query: Query,
    mod_query: Query,
}

impl RustAnalyzer {
    pub fn new() -> Result<Self> {
        let language: TsLanguage = tree_sitter_rust::LANGUAGE.into();

        let item_query = Query::new(
            &language,
            r#"
            [
              (struct_item name: (type_identifier) @class_name)
              (enum_item name: (type_identifier) @class_name)
              (trait_item name: (type_identifier) @iface_name)
              (function_item name: (identifier) @fn_name)
            ]
            "#,
        )
        .context("failed to compile item query")?;

        let use_query = Query::new(
            &language,
            r#"
            (use_declaration
              argument: (_) @path)
            "#,
        )
        .context("failed to compile use query")?;

        let mod_query = Query::new(
            &language,
            r#"
            (mod_item name: (identifier) @mod_name) @mod_node
            "#,
        )
        .context("failed to compile mod query")?;

        Ok(Self { language, item_query, use_query, mod_query })
    }
}

impl Default for RustAnalyzer {
    fn default() -> Self {
        Self::new().expect("built-in tree-sitter-rust grammar/queries must compile")
    }
}

impl LanguageAnalyzer for RustAnalyzer {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn file_extensions(&self) -> &[&str] {
        &["rs"]
    }

    fn parse_file(&self, path: &Path, content: &str, module_id: &str) -> Result<ParsedFile> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).context("failed to set Rust language")?;
        let tree = parser.parse(content, None).context("failed to parse Rust file")?;
        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
            module_id: module_id.to_string(),
        })
    }

    fn extract(&self, parsed: &ParsedFile) -> ParseOutcome {
        let mut nodes = Vec::new();
        let mut has_trait = false;
        let mut has_type = false;

        let mut cursor = QueryCursor::new();
        let class_idx = self.item_query.capture_names().iter().position(|n| *n == "class_name");
        let iface_idx = self.item_query.capture_names().iter().position(|n| *n == "iface_name");
        let fn_idx = self.item_query.capture_names().iter().position(|n| *n == "fn_name");

        let mut matches = cursor.matches(&self.item_query, parsed.tree.root_node(), parsed.content.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let idx = Some(capture.index as usize);
                let line = capture.node.start_position().row + 1;
                if idx == class_idx {
                    has_type = true;
                    nodes.push(ParsedNode { module_id: parsed.module_id.clone(), kind: NodeKind::Class, line });
                } else if idx == iface_idx {
                    has_trait = true;
                    nodes.push(ParsedNode { module_id: parsed.module_id.clone(), kind: NodeKind::Interface, line });
                } else if idx == fn_idx {
                    nodes.push(ParsedNode { module_id: parsed.module_id.clone(), kind: NodeKind::Function, line });
                }
            }
        }

        let node_kind = if has_trait {
            NodeKind::Interface
        } else if has_type {
            NodeKind::Class
        } else {
            NodeKind::Module
        };
        nodes.insert(0, ParsedNode { module_id: parsed.module_id.clone(), kind: node_kind, line: 1 });

        let mut imports = extract_use_imports(&self.use_query, parsed);
        imports.extend(extract_mod_declarations(&self.mod_query, parsed));

        ParseOutcome { nodes, imports, node_kind }
    }

    fn resolve_import(&self, import: &ParsedImport, from_module_id: &str, _ctx: &ProjectContext) -> Resolution {
        let text = import.text.trim();

        if let Some(rest) = text.strip_prefix("crate::") {
            let root = from_module_id.split("::").next().unwrap_or(from_module_id);
            return Resolution::Internal(format!("{root}::{}", normalize_path_segment(rest)));
        }
        if let Some(rest) = text.strip_prefix("self::") {
            return Resolution::Internal(format!("{from_module_id}::{}", normalize_path_segment(rest)));
        }
        if let Some(rest) = text.strip_prefix("super::") {
            let parent = from_module_id.rsplit_once("::").map(|(p, _)| p).unwrap_or(from_module_id);
            return Resolution::Internal(format!("{parent}::{}", normalize_path_segment(rest)));
        }
        if import.is_relative {
            // synthetic `mod name;` declaration
            return Resolution::Internal(format!("{from_module_id}::{text}"));
        }

        let first_segment = text.split("::").next().unwrap_or(text);
        if stdlib::is_rust_stdlib_root(first_segment) {
            Resolution::Stdlib(first_segment.to_string())
        } else {
            Resolution::External(first_segment.to_string())
        }
    }
}

/// Strip a trailing `{a, b}` / `*` group off a `use` path so `crate::foo::{bar, baz}`
/// and `crate::foo::*` both resolve against `crate::foo`.
fn normalize_path_segment(rest: &str) -> String {
    let trimmed = strip_use_group(rest);
    trimmed.trim_end_matches("::").to_string()
}

fn strip_use_group(path: &str) -> &str {
    if let Some(pos) = path.find("::{") {
        &path[..pos]
    } else if let Some(pos) = path.find("::*") {
        &path[..pos]
    } else {
        path
    }
}

fn extract_use_imports(query: &Query, parsed: &ParsedFile) -> Vec<ParsedImport> {
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
            let names = use_leaf_names(&raw);
            imports.push(ParsedImport {
                text: raw,
                names,
                is_relative: false,
                level: 0,
                line: node.start_position().row + 1,
            });
        }
    }
    imports
}

/// `mod name;` with no body is a declaration of a child module in the same
/// directory tree, modeled as a synthetic relative import.
fn extract_mod_declarations(query: &Query, parsed: &ParsedFile) -> Vec<ParsedImport> {
    let mut imports = Vec::new();
    let mut cursor = QueryCursor::new();
    let name_idx = query.capture_names().iter().position(|n| *n == "mod_name").unwrap_or(0);
    let node_idx = query.capture_names().iter().position(|n| *n == "mod_node");

    let mut matches = cursor.matches(query, parsed.tree.root_node(), parsed.content.as_bytes());
    while let Some(m) = matches.next() {
        let mut name = String::new();
        let mut mod_node = None;
        for capture in m.captures {
            let idx = Some(capture.index as usize);
            if idx == Some(name_idx) {
                name = node_text(capture.node, &parsed.content);
            } else if idx == node_idx {
                mod_node = Some(capture.node);
            }
        }
        let Some(mod_node) = mod_node else { continue };
        if mod_node.child_by_field_name("body").is_some() {
            continue;
        }
        if name.is_empty() {
            continue;
        }
        imports.push(ParsedImport {
            text: name.clone(),
            names: vec![name],
            is_relative: true,
            level: 0,
            line: mod_node.start_position().row + 1,
        });
    }
    imports
}

/// Best-effort extraction of the imported leaf names from a `use` path's raw text.
fn use_leaf_names(raw: &str) -> Vec<String> {
    if let Some(start) = raw.find("::{") {
        let inner = &raw[start + 3..raw.rfind('}').unwrap_or(raw.len())];
        return inner.split(',').map(|s| s.trim().split(" as ").last().unwrap_or(s.trim()).to_string()).filter(|s| !s.is_empty()).collect();
    }
    if raw.ends_with("::*") {
        return vec!["*".to_string()];
    }
    match raw.rsplit_once("::") {
        Some((_, leaf)) => vec![leaf.split(" as ").last().unwrap_or(leaf).to_string()],
        None => vec![raw.to_string()],
    }
}

fn node_text(node: tree_sitter::Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}
