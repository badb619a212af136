//! Immutable project context: precomputed path/module lookups and manifest
//! data, built once before parse workers start.

use std::collections::{HashMap, HashSet};
use std::path::Path;

/// TypeScript/JavaScript path alias table from `tsconfig.json`/`jsconfig.json`.
#[derive(Debug, Clone, Default)]
pub struct TsPathAliases {
    pub base_url: Option<String>,
    /// alias pattern (e.g. `"@/*"`) -> candidate targets (e.g. `["src/*"]`)
    pub paths: HashMap<String, Vec<String>>,
}

/// Manifest-derived, per-language settings consumed by resolvers.
#[derive(Debug, Clone, Default)]
pub struct ManifestContext {
    /// `go.mod` `module` line, if present and parseable.
    pub go_module: Option<String>,
    /// `[package] name` from `Cargo.toml`, if present.
    pub cargo_package: Option<String>,
    pub ts_aliases: TsPathAliases,
    /// `package.json` dependencies + devDependencies, name -> version.
    pub package_json_deps: HashMap<String, String>,
}

/// Immutable, precomputed project-wide state shared (read-only) by all
/// resolvers during parsing.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    pub project_root: std::path::PathBuf,
    /// The set of all internal module ids discovered by the driver.
    pub project_modules: HashSet<String>,
    /// relative path (POSIX, no leading `/`) -> module id, plus JS/TS
    /// extensionless / `dir/index.*` <-> `dir` equivalences.
    pub path_to_module: HashMap<String, String>,
    /// The set of relative paths that exist, used as the "candidate exists"
    /// oracle for JS/TS relative-import resolution without hitting disk.
    pub known_paths: HashSet<String>,
    pub manifests: ManifestContext,
}

impl ProjectContext {
    pub fn new(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            ..Default::default()
        }
    }

    pub fn register_module(&mut self, rel_path: &str, module_id: &str) {
        self.project_modules.insert(module_id.to_string());
        self.known_paths.insert(rel_path.to_string());
        self.path_to_module
            .insert(rel_path.to_string(), module_id.to_string());
    }

    /// Does a project module id exist with this exact id, or as the parent
    /// of some registered module (Python resolution step 3a/3b)?
    pub fn has_module_or_parent(&self, candidate: &str) -> bool {
        if self.project_modules.contains(candidate) {
            return true;
        }
        let prefix = format!("{candidate}.");
        self.project_modules.iter().any(|m| m.starts_with(&prefix))
    }

    /// Does `candidate` start with some registered project module id
    /// (Python resolution step 3c: "resolved starts with a project module id")?
    pub fn has_prefix_match(&self, candidate: &str) -> bool {
        self.project_modules
            .iter()
            .any(|m| candidate == m || candidate.starts_with(&format!("{m}.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut ctx = ProjectContext::new(Path::new("."));
        ctx.register_module("app/utils.py", "app.utils");
        assert!(ctx.project_modules.contains("app.utils"));
        assert!(ctx.has_module_or_parent("app.utils"));
        assert!(ctx.has_module_or_parent("app"));
        assert!(!ctx.has_module_or_parent("other"));
    }
}
