//! Error types for the CLI

use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Config file could not be read
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file or report could not be (de)serialized
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// A scenario produced outcomes it should not have
    #[error("Scenario '{scenario}' failed: {failures} unexpected outcome(s)")]
    Unexpected {
        /// Scenario name
        scenario: String,
        /// Number of unexpected outcomes
        failures: usize,
    },
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
