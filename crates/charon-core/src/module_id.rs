//! Module identifier derivation and monorepo service detection.

use crate::types::Language;

/// Derive a module id from a POSIX-normalized, leading-`/`-stripped relative
/// path and its language.
pub fn derive_module_id(language: Language, rel_path: &str) -> String {
    let path = rel_path.trim_start_matches('/');
    match language {
        Language::Python => {
            let stripped = path.strip_suffix(".py").or_else(|| path.strip_suffix(".pyi")).unwrap_or(path);
            let parts: Vec<&str> = stripped.split('/').collect();
            let mut parts: Vec<&str> = parts.into_iter().filter(|p| !p.is_empty()).collect();
            if parts.last() == Some(&"__init__") {
                parts.pop();
            }
            parts.join(".")
        }
        Language::JavaScript | Language::TypeScript => {
            let stripped = strip_known_extension(path);
            let mut parts: Vec<&str> = stripped.split('/').filter(|p| !p.is_empty()).collect();
            if parts.last() == Some(&"index") {
                parts.pop();
            }
            parts.join(".")
        }
        Language::Go | Language::Java => {
            let stripped = strip_known_extension(path);
            stripped
                .split('/')
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(".")
        }
        Language::Rust => {
            let stripped = path.strip_suffix(".rs").unwrap_or(path);
            let mut parts: Vec<&str> = stripped.split('/').filter(|p| !p.is_empty()).collect();
            if matches!(parts.last(), Some(&"mod") | Some(&"lib") | Some(&"main")) {
                parts.pop();
            }
            parts.join("::")
        }
    }
}

fn strip_known_extension(path: &str) -> &str {
    for ext in [
        ".tsx", ".jsx", ".mts", ".cts", ".mjs", ".cjs", ".ts", ".js", ".go", ".java",
    ] {
        if let Some(stripped) = path.strip_suffix(ext) {
            return stripped;
        }
    }
    path
}

const TOP_LEVEL_SERVICE_TAGS: &[&str] = &[
    "frontend", "backend", "api", "web", "mobile", "server", "client", "admin", "dashboard",
    "core", "common", "shared",
];

const MULTI_PART_CONTAINERS: &[&str] = &["packages", "libs", "apps", "services", "modules", "projects"];

/// Heuristic monorepo service grouping derived from leading path segments.
pub fn detect_service(rel_path: &str) -> Option<String> {
    let parts: Vec<&str> = rel_path
        .trim_start_matches('/')
        .split('/')
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }

    let first = parts[0];
    if TOP_LEVEL_SERVICE_TAGS.contains(&first) {
        return Some(first.to_string());
    }
    if MULTI_PART_CONTAINERS.contains(&first) && parts.len() >= 2 {
        return Some(parts[1].to_string());
    }
    if first == "src" {
        if parts.len() >= 2 {
            let second = parts[1];
            if TOP_LEVEL_SERVICE_TAGS.contains(&second) || MULTI_PART_CONTAINERS.contains(&second) {
                return Some(second.to_string());
            }
        }
        return Some("main".to_string());
    }
    if parts.len() >= 2 {
        return Some(first.to_string());
    }
    None
}
