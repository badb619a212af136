use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use charon_core::analyzer::LanguageAnalyzer;
use charon_core::config::Config;
use charon_core::driver::{AnalysisDriver, Progress};
use charon_core::evolution;
use charon_core::fitness::{evaluate_rules, FitnessContext, FitnessRuleFile};
use charon_core::graph::DependencyGraph;
use charon_core::metrics::{AnalysisResult, NodeMetrics};

use charon_go::GoAnalyzer;
use charon_java::JavaAnalyzer;
use charon_javascript::JavaScriptAnalyzer;
use charon_python::PythonAnalyzer;
use charon_report::{json, text};
use charon_rust::RustAnalyzer;
use charon_typescript::TypeScriptAnalyzer;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "charon")]
#[command(about = "Analyze cross-language source dependency graphs and enforce architectural fitness rules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a project directory and print the dependency graph and metrics
    Analyze {
        /// Path to the project root
        path: PathBuf,
        /// Config file path (defaults to .charon.toml in the project root)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Compact output (single-line JSON)
        #[arg(long)]
        compact: bool,
        /// Write the analysis artifact to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate fitness rules against a previously produced analysis artifact
    FitnessCheck {
        /// Path to a fitness rule file (JSON)
        #[arg(long)]
        rules: PathBuf,
        /// Path to a previously produced `analyze --format json` artifact
        #[arg(long)]
        graph: PathBuf,
        /// Fail (exit 1) if any error-severity violation is found
        #[arg(long)]
        fail_on_error: bool,
        /// Fail (exit 1) if any warning-severity violation is found
        #[arg(long)]
        fail_on_warning: bool,
        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Append this run to the fitness history log
        #[arg(long)]
        save_history: bool,
        /// Project name used for the history log (defaults to the graph file's directory name)
        #[arg(long)]
        project_name: Option<String>,
        /// History storage directory (defaults to $FITNESS_STORAGE_PATH or .charon_fitness)
        #[arg(long)]
        storage_path: Option<PathBuf>,
        /// Suppress the human-readable report
        #[arg(long)]
        quiet: bool,
        /// Emit the report as JSON instead of text
        #[arg(long)]
        json_output: bool,
    },
    /// Create a default .charon.toml configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Analyze { path, config, format, compact, output } => {
            cmd_analyze(&path, config.as_deref(), format, compact, output.as_deref())
        }
        Commands::FitnessCheck {
            rules,
            graph,
            fail_on_error,
            fail_on_warning,
            output,
            save_history,
            project_name,
            storage_path,
            quiet,
            json_output,
        } => cmd_fitness_check(
            &rules,
            &graph,
            fail_on_error,
            fail_on_warning,
            output.as_deref(),
            save_history,
            project_name.as_deref(),
            storage_path.as_deref(),
            quiet,
            json_output,
        ),
        Commands::Init { force } => cmd_init(force).map(|_| 0),
    };

    match outcome {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(2);
        }
    }
}

fn validate_path(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("path '{}' does not exist", path.display());
    }
    if !path.is_dir() {
        anyhow::bail!("path '{}' is not a directory", path.display());
    }
    Ok(())
}

/// Build the full set of built-in language analyzers.
fn all_analyzers() -> Vec<Box<dyn LanguageAnalyzer>> {
    vec![
        Box::new(PythonAnalyzer::default()),
        Box::new(JavaScriptAnalyzer::default()),
        Box::new(TypeScriptAnalyzer::default()),
        Box::new(GoAnalyzer::default()),
        Box::new(JavaAnalyzer::default()),
        Box::new(RustAnalyzer::default()),
    ]
}

fn load_config(project_path: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(project_path)),
    }
}

fn cmd_analyze(
    path: &Path,
    config_path: Option<&Path>,
    format: OutputFormat,
    compact: bool,
    output_path: Option<&Path>,
) -> Result<i32> {
    validate_path(path)?;
    let project_root = charon_core::driver::find_project_root(path);
    let config = load_config(&project_root, config_path)?;

    let driver = AnalysisDriver::new(all_analyzers(), config);
    let result = driver
        .analyze(path, None, Some(&print_progress))
        .context("analysis failed")?;

    let report = match format {
        OutputFormat::Text => text::format_report(&result),
        OutputFormat::Json => json::format_report(&result, compact),
    };

    match output_path {
        Some(p) => {
            std::fs::write(p, &report).with_context(|| format!("failed to write output to {}", p.display()))?;
            eprintln!("Analysis artifact written to {}", p.display());
        }
        None => println!("{report}"),
    }
    Ok(0)
}

fn print_progress(p: Progress) {
    let label = match p {
        Progress::Fetch => "fetching files",
        Progress::Parse => "parsing",
        Progress::Resolve => "resolving imports",
        Progress::Build => "building graph",
        Progress::Metrics => "computing metrics",
        Progress::Layout => "clustering & refactoring analysis",
        Progress::Complete => "done",
    };
    eprintln!("[charon] {label}");
}

#[allow(clippy::too_many_arguments)]
fn cmd_fitness_check(
    rules_path: &Path,
    graph_path: &Path,
    fail_on_error: bool,
    fail_on_warning: bool,
    output_path: Option<&Path>,
    save_history: bool,
    project_name: Option<&str>,
    storage_path: Option<&Path>,
    quiet: bool,
    json_output: bool,
) -> Result<i32> {
    let rules_content = std::fs::read_to_string(rules_path)
        .with_context(|| format!("failed to read rules file {}", rules_path.display()))?;
    let rule_file: FitnessRuleFile =
        serde_json::from_str(&rules_content).with_context(|| format!("failed to parse rules file {}", rules_path.display()))?;

    let graph_content = std::fs::read_to_string(graph_path)
        .with_context(|| format!("failed to read graph artifact {}", graph_path.display()))?;
    let analysis: AnalysisResult = serde_json::from_str(&graph_content)
        .with_context(|| format!("failed to parse graph artifact {}", graph_path.display()))?;

    let (graph, node_metrics) = rebuild_graph(&analysis);
    let (cycles, _truncated) = graph.find_cycles(10_000);
    let ctx = FitnessContext { graph: &graph, metrics: &node_metrics, cycles: &cycles };

    let report = evaluate_rules(&rule_file.rules, &ctx, fail_on_error, fail_on_warning);

    if save_history {
        let storage_root = storage_path.map(PathBuf::from).unwrap_or_else(evolution::storage_root);
        let name = project_name
            .map(String::from)
            .or_else(|| graph_path.parent().and_then(|p| p.file_name()).map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "project".to_string());
        let repo_dir = graph_path.parent().unwrap_or_else(|| Path::new("."));
        let written = evolution::save_history(&storage_root, &name, repo_dir, &report)?;
        eprintln!("Fitness history recorded at {}", written.display());
    }

    let (rendered, exit_code) = if json_output {
        json::format_fitness_check(&report)
    } else {
        text::format_fitness_check(&report)
    };

    match output_path {
        Some(p) => {
            std::fs::write(p, &rendered).with_context(|| format!("failed to write output to {}", p.display()))?;
        }
        None if quiet => {}
        None => println!("{rendered}"),
    }

    Ok(exit_code)
}

/// Reconstruct a [`DependencyGraph`] and per-node metrics map from a
/// serialized [`AnalysisResult`] artifact, for fitness-rule evaluation
/// against a previously produced `analyze --format json` output.
fn rebuild_graph(analysis: &AnalysisResult) -> (DependencyGraph, std::collections::HashMap<String, NodeMetrics>) {
    let mut graph = DependencyGraph::new();
    let mut node_metrics = std::collections::HashMap::new();

    for node in &analysis.graph.nodes {
        match &node.metadata {
            Some(metadata) => {
                graph.add_internal_node(&node.id, metadata.clone());
            }
            None => {
                let package = node.id.trim_start_matches(charon_core::graph::THIRD_PARTY_PREFIX);
                graph.ensure_third_party_node(package);
            }
        }
        if let Some(metrics) = &node.metrics {
            node_metrics.insert(node.id.clone(), metrics.clone());
        }
    }

    for edge in &analysis.graph.edges {
        if let (Some(from_idx), Some(to_idx)) = (graph.node_index(&edge.from), graph.node_index(&edge.to)) {
            graph.add_edge(from_idx, to_idx, &edge.imports);
        }
    }

    (graph, node_metrics)
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(".charon.toml");
    if target.exists() && !force {
        anyhow::bail!(".charon.toml already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml())?;
    println!("Created .charon.toml with default configuration.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use charon_core::metrics::{build_global_metrics, EdgeRecord, GraphRecord, NodeRecord};
    use charon_core::refactoring::RefactoringSummary;
    use charon_core::types::{Language, ModuleMetadata, NodeKind, NodeType};

    fn sample_analysis() -> AnalysisResult {
        let graph = DependencyGraph::new();
        let node_metrics = std::collections::HashMap::new();
        let global_metrics = build_global_metrics(
            &graph,
            &node_metrics,
            std::collections::HashMap::new(),
            vec![],
            false,
            0.0,
            vec![],
            vec![],
            vec![],
            RefactoringSummary::default(),
        );

        let meta = ModuleMetadata {
            language: Language::Python,
            file_path: PathBuf::from("app/db.py"),
            service: None,
            node_kind: NodeKind::Module,
        };
        AnalysisResult {
            graph: GraphRecord {
                nodes: vec![
                    NodeRecord { id: "app.ui".to_string(), node_type: NodeType::Internal, metadata: Some(meta.clone()), metrics: None },
                    NodeRecord { id: "app.db".to_string(), node_type: NodeType::Internal, metadata: Some(meta), metrics: None },
                ],
                edges: vec![EdgeRecord { from: "app.ui".to_string(), to: "app.db".to_string(), imports: vec!["Session".to_string()], weight: 1 }],
            },
            global_metrics,
            warnings: vec![],
        }
    }

    #[test]
    fn test_rebuild_graph_preserves_nodes_and_edges() {
        let analysis = sample_analysis();
        let (graph, _metrics) = rebuild_graph(&analysis);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let ui = graph.node_index("app.ui").unwrap();
        let db = graph.node_index("app.db").unwrap();
        assert!(graph.has_edge(ui, db));
    }

    #[test]
    fn test_fitness_check_end_to_end_rejects_forbidden_import() {
        let analysis = sample_analysis();
        let (graph, node_metrics) = rebuild_graph(&analysis);
        let (cycles, _) = graph.find_cycles(10_000);
        let ctx = FitnessContext { graph: &graph, metrics: &node_metrics, cycles: &cycles };

        let rule_file: FitnessRuleFile = serde_json::from_str(
            r#"{"rules":[{"name":"no-ui-to-db","type":"import_restriction","severity":"error","forbidden_source_pattern":"^app\\.ui","forbidden_target_pattern":"^app\\.db"}]}"#,
        )
        .unwrap();

        let report = evaluate_rules(&rule_file.rules, &ctx, true, false);
        assert!(!report.passed);
        assert_eq!(report.errors, 1);
    }
}
