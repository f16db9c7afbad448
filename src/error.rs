//! Error types for the generation pipeline.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Primary error type for configuration, generation, and execution.
#[derive(Debug, Error)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration validation failed: {0}")]
    Config(String),

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    // === Resource Errors ===
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("k6 is not installed or not in PATH. Install: https://grafana.com/docs/k6/latest/set-up/install-k6/")]
    K6NotFound,

    // === Generation Errors ===
    #[error("Array parameter '{0}' must have at least one value")]
    EmptyArray(String),

    #[error("No data found in CSV file: {0}")]
    EmptyCsv(String),

    #[error("Column '{column}' not found in CSV file: {file}")]
    MissingColumn { column: String, file: String },

    // === Execution Errors ===
    #[error("Failed to launch k6: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("k6 test execution failed")]
    ExecutionFailed,
}
