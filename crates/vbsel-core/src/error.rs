//! Error types for vbsel

use thiserror::Error;

/// vbsel error type
///
/// Event-level aborts (bad jets, too few jets) are not errors; they are
/// reported as skipped outcomes by the analysis. Everything here is either a
/// configuration mismatch or an I/O problem and is fatal for the run.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Invalid analysis configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fill of a histogram that was never booked
    #[error("histogram '{0}' was not declared")]
    UndeclaredHistogram(String),

    /// Write of an ntuple field that is not part of the schema
    #[error("ntuple field '{0}' was not declared")]
    UndeclaredField(String),

    /// Acceptance into a region that was never declared
    #[error("region '{0}' was not declared")]
    UndeclaredRegion(String),

    /// Malformed record from an event source
    #[error("event source error at line {line}: {message}")]
    Source {
        /// 1-based line (or record) number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// Cut expression could not be parsed or bound
    #[error("Expression error: {0}")]
    Expression(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
