//! The analysis driver: file discovery, parallel parsing, then sequential
//! resolution, graph-building, metrics, clustering, and refactoring analysis.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSetBuilder};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::analyzer::LanguageAnalyzer;
use crate::clustering;
use crate::config::Config;
use crate::error::{AnalysisError, Result};
use crate::graph::DependencyGraph;
use crate::metrics::{
    build_global_metrics, compute_node_metrics, high_coupling_threshold, AnalysisResult, EdgeRecord, GraphRecord,
    NodeMetrics, NodeRecord,
};
use crate::module_id::{derive_module_id, detect_service};
use crate::project::ProjectContext;
use crate::refactoring::detect_refactorings;
use crate::types::{language_for_extension, Language, ModuleMetadata, Resolution};

/// The seven canonical progress milestones a caller may observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Fetch,
    Parse,
    Resolve,
    Build,
    Metrics,
    Layout,
    Complete,
}

fn report(cb: Option<&dyn Fn(Progress)>, p: Progress) {
    if let Some(cb) = cb {
        cb(p);
    }
}

fn check_cancelled(cancel: Option<&std::sync::atomic::AtomicBool>) -> Result<()> {
    if let Some(flag) = cancel {
        if flag.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(AnalysisError::Cancelled);
        }
    }
    Ok(())
}

/// Walk up from `start` looking for `.charon.toml` or `.git`, falling back
/// to `start` itself if neither is found.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if cur.join(".charon.toml").exists() || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(parent) => cur = parent,
            None => return start.to_path_buf(),
        }
    }
}

struct DiscoveredFile {
    path: PathBuf,
    rel_path: String,
    language: Language,
}

fn build_excludes(patterns: &[String]) -> globset::GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

/// Files larger than this are skipped outright rather than parsed; a single
/// generated or vendored file this size would dominate analysis time without
/// adding meaningful module information.
const MAX_FILE_SIZE_BYTES: u64 = 500_000;

fn discover_files(root: &Path, languages: &[Language], excludes: &globset::GlobSet, warnings: &mut Vec<String>) -> Vec<DiscoveredFile> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
        let Some(language) = language_for_extension(ext) else { continue };
        if !languages.contains(&language) {
            continue;
        }
        let rel_path = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");
        if excludes.is_match(&rel_path) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) if meta.len() > MAX_FILE_SIZE_BYTES => {
                warnings.push(format!("skipped {rel_path}: exceeds {MAX_FILE_SIZE_BYTES}-byte file size cap"));
                continue;
            }
            _ => {}
        }
        out.push(DiscoveredFile { path: path.to_path_buf(), rel_path, language });
    }
    out
}

struct FileParse {
    module_id: String,
    language: Language,
    metadata: ModuleMetadata,
    imports: Vec<crate::types::ParsedImport>,
    complexity: crate::types::ComplexityMetrics,
}

/// Orchestrates a full analysis run over a project tree.
pub struct AnalysisDriver {
    analyzers: Vec<Box<dyn LanguageAnalyzer>>,
    config: Config,
}

impl AnalysisDriver {
    pub fn new(analyzers: Vec<Box<dyn LanguageAnalyzer>>, config: Config) -> Self {
        Self { analyzers, config }
    }

    fn analyzer_for(&self, language: Language) -> Option<&dyn LanguageAnalyzer> {
        self.analyzers.iter().find(|a| a.language() == language).map(|b| b.as_ref())
    }

    pub fn analyze(&self, root: &Path, cancel: Option<&std::sync::atomic::AtomicBool>, progress: Option<&dyn Fn(Progress)>) -> Result<AnalysisResult> {
        let mut warnings = Vec::new();

        // --- Fetch ---
        report(progress, Progress::Fetch);
        check_cancelled(cancel)?;
        let languages: Vec<Language> = self
            .config
            .project
            .languages
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        let excludes = build_excludes(&self.config.project.exclude_patterns);
        let files = discover_files(root, &languages, &excludes, &mut warnings);
        if files.is_empty() {
            return Err(AnalysisError::Unsupported);
        }

        // Build the immutable project context up front so every resolver
        // sees the full module set before any import resolution happens.
        let mut ctx = ProjectContext::new(root);
        let mut module_ids: HashMap<PathBuf, String> = HashMap::new();
        for file in &files {
            let module_id = derive_module_id(file.language, &file.rel_path);
            ctx.register_module(&file.rel_path, &module_id);
            module_ids.insert(file.path.clone(), module_id);
        }
        load_manifests(root, &mut ctx, &mut warnings);

        // --- Parse (parallel) ---
        report(progress, Progress::Parse);
        check_cancelled(cancel)?;
        let parse_results: Vec<Result<FileParse>> = files
            .par_iter()
            .map(|file| -> std::result::Result<FileParse, String> {
                let content = std::fs::read_to_string(&file.path).map_err(|e| format!("failed to read {}: {e}", file.path.display()))?;
                let analyzer = self
                    .analyzer_for(file.language)
                    .ok_or_else(|| format!("no analyzer registered for {}", file.language))?;
                let module_id = module_ids.get(&file.path).cloned().unwrap_or_default();
                let parsed_file = analyzer
                    .parse_file(&file.path, &content, &module_id)
                    .map_err(|e| format!("Parse error in {}: {e}", file.path.display()))?;
                let outcome = analyzer.extract(&parsed_file);
                let complexity = analyzer.complexity(&parsed_file).unwrap_or_default();
                let service = detect_service(&file.rel_path);
                let metadata = ModuleMetadata {
                    language: file.language,
                    file_path: file.path.clone(),
                    service,
                    node_kind: outcome.node_kind,
                };
                Ok(FileParse { module_id, language: file.language, metadata, imports: outcome.imports, complexity })
            })
            .map(|r| r.map_err(AnalysisError::Internal))
            .collect();

        let mut graph = DependencyGraph::new();
        let mut file_parses = Vec::new();
        for result in parse_results {
            match result {
                Ok(fp) => {
                    graph.add_internal_node(&fp.module_id, fp.metadata.clone());
                    file_parses.push(fp);
                }
                Err(AnalysisError::Internal(msg)) => warnings.push(msg),
                Err(e) => return Err(e),
            }
        }

        // --- Resolve + Build ---
        report(progress, Progress::Resolve);
        check_cancelled(cancel)?;
        for fp in &file_parses {
            let Some(analyzer) = self.analyzer_for(fp.language) else { continue };
            let Some(from_idx) = graph.node_index(&fp.module_id) else { continue };
            for import in &fp.imports {
                match analyzer.resolve_import(import, &fp.module_id, &ctx) {
                    Resolution::Internal(target) => {
                        if let Some(to_idx) = graph.node_index(&target) {
                            graph.add_edge(from_idx, to_idx, &import.names);
                        } else {
                            warnings.push(format!("`{}` resolved to unknown internal module `{target}`", fp.module_id));
                        }
                    }
                    Resolution::External(package) => {
                        let to_idx = graph.ensure_third_party_node(&package);
                        graph.add_edge(from_idx, to_idx, &import.names);
                    }
                    Resolution::Stdlib(_) => {}
                }
            }
        }
        report(progress, Progress::Build);
        check_cancelled(cancel)?;

        // --- Metrics ---
        report(progress, Progress::Metrics);
        check_cancelled(cancel)?;
        let (cycles, cycles_truncated) = graph.find_cycles(self.config.metrics.max_cycles_reported);
        let circular_members: std::collections::HashSet<String> = cycles.iter().flatten().cloned().collect();

        let efferent_values: Vec<usize> = graph.internal_node_indices().iter().map(|&idx| graph.efferent_coupling(idx)).collect();
        let threshold = high_coupling_threshold(&efferent_values, self.config.metrics.high_coupling_percentile);

        let complexity_by_module: HashMap<String, crate::types::ComplexityMetrics> =
            file_parses.iter().map(|fp| (fp.module_id.clone(), fp.complexity.clone())).collect();

        let mut node_metrics: HashMap<String, NodeMetrics> = HashMap::new();
        for idx in graph.internal_node_indices() {
            let id = graph.node(idx).id.clone();
            // Non-Python modules get the all-zero/Grade::A default complexity.
            let complexity = complexity_by_module.get(&id).cloned().unwrap_or_default();
            let nm = compute_node_metrics(&graph, idx, threshold, &circular_members, complexity);
            node_metrics.insert(id, nm);
        }

        let mut totals_by_kind: HashMap<String, usize> = HashMap::new();
        for node in graph.internal_nodes() {
            if let Some(meta) = &node.metadata {
                *totals_by_kind.entry(meta.node_kind.to_string()).or_insert(0) += 1;
            }
        }

        // --- Layout (clustering + refactoring) ---
        report(progress, Progress::Layout);
        check_cancelled(cancel)?;
        let clusters = clustering::detect_clusters(&graph, self.config.metrics.cluster_resolution);
        let package_suggestions = clustering::suggest_packages(&clusters);
        let (refactoring_suggestions, refactoring_summary) = detect_refactorings(&graph, &node_metrics, &cycles);

        let global_metrics = build_global_metrics(
            &graph,
            &node_metrics,
            totals_by_kind,
            cycles,
            cycles_truncated,
            threshold,
            clusters,
            package_suggestions,
            refactoring_suggestions,
            refactoring_summary,
        );

        let nodes: Vec<NodeRecord> = graph
            .nodes()
            .map(|n| NodeRecord {
                id: n.id.clone(),
                node_type: n.node_type,
                metadata: n.metadata.clone(),
                metrics: node_metrics.get(&n.id).cloned(),
            })
            .collect();
        let edges: Vec<EdgeRecord> = graph
            .edges_with_nodes()
            .into_iter()
            .map(|(from, to, edge)| EdgeRecord {
                from: from.id.clone(),
                to: to.id.clone(),
                imports: edge.imports.clone(),
                weight: edge.weight,
            })
            .collect();

        report(progress, Progress::Complete);
        Ok(AnalysisResult {
            graph: GraphRecord { nodes, edges },
            global_metrics,
            warnings,
        })
    }
}

fn load_manifests(root: &Path, ctx: &mut ProjectContext, warnings: &mut Vec<String>) {
    if let Ok(content) = std::fs::read_to_string(root.join("go.mod")) {
        if let Some(module) = content.lines().find_map(|l| l.strip_prefix("module ")) {
            ctx.manifests.go_module = Some(module.trim().to_string());
        } else {
            warnings.push("go.mod found but no module line could be parsed".to_string());
        }
    }

    if let Ok(content) = std::fs::read_to_string(root.join("Cargo.toml")) {
        match content.parse::<toml::Value>() {
            Ok(value) => {
                if let Some(name) = value.get("package").and_then(|p| p.get("name")).and_then(|n| n.as_str()) {
                    ctx.manifests.cargo_package = Some(name.to_string());
                }
            }
            Err(e) => warnings.push(format!("failed to parse Cargo.toml: {e}")),
        }
    }

    if let Ok(content) = std::fs::read_to_string(root.join("package.json")) {
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => {
                for section in ["dependencies", "devDependencies"] {
                    if let Some(deps) = value.get(section).and_then(|d| d.as_object()) {
                        for (name, version) in deps {
                            let version = version.as_str().unwrap_or("*").to_string();
                            ctx.manifests.package_json_deps.insert(name.clone(), version);
                        }
                    }
                }
            }
            Err(e) => warnings.push(format!("failed to parse package.json: {e}")),
        }
    }

    for filename in ["tsconfig.json", "jsconfig.json"] {
        let path = root.join(filename);
        let Ok(content) = std::fs::read_to_string(&path) else { continue };
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => {
                let compiler = value.get("compilerOptions");
                if let Some(base_url) = compiler.and_then(|c| c.get("baseUrl")).and_then(|b| b.as_str()) {
                    ctx.manifests.ts_aliases.base_url = Some(base_url.to_string());
                }
                if let Some(paths) = compiler.and_then(|c| c.get("paths")).and_then(|p| p.as_object()) {
                    for (alias, targets) in paths {
                        let targets: Vec<String> = targets
                            .as_array()
                            .map(|a| a.iter().filter_map(|t| t.as_str().map(String::from)).collect())
                            .unwrap_or_default();
                        ctx.manifests.ts_aliases.paths.insert(alias.clone(), targets);
                    }
                }
                break;
            }
            Err(e) => warnings.push(format!("failed to parse {filename}: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_project_root_falls_back_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let found = find_project_root(dir.path());
        assert_eq!(found, dir.path());
    }

    #[test]
    fn test_find_project_root_finds_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".charon.toml"), "").unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested), dir.path());
    }
}
