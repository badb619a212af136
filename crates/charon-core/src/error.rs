//! Error taxonomy. Per-file and resolution problems are *not*
//! represented here — they are non-fatal and flow into the analysis
//! result's `warnings` list instead. This enum covers failures that abort
//! the pipeline or reject input before analysis is attempted.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("unsupported: no files matched the extension allow-list")]
    Unsupported,

    #[error("analysis cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
