pub mod analyzer;
pub mod cache;
pub mod clustering;
pub mod complexity;
pub mod config;
pub mod driver;
pub mod error;
pub mod evolution;
pub mod fitness;
pub mod graph;
pub mod metrics;
pub mod module_id;
pub mod project;
pub mod stdlib;
pub mod types;

pub use analyzer::{LanguageAnalyzer, ParseOutcome, ParsedFile};
pub use config::Config;
pub use driver::{AnalysisDriver, Progress};
pub use error::{AnalysisError, Result};
pub use graph::DependencyGraph;
pub use metrics::AnalysisResult;
pub use project::ProjectContext;
pub use types::*;
