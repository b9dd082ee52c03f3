use crate::app::ConfigError;
use thiserror::Error;

/// Top-level error type for the log writer.
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid configuration for destination '{name}': {}", .problems.join("; "))]
    InvalidDestination { name: String, problems: Vec<String> },

    #[error("Destination '{name}' does not exist and auto-create is disabled")]
    DestinationMissing { name: String },

    #[error("Destination '{name}' did not become ready before the retry timeout")]
    DestinationNotReady { name: String },

    #[error("Initialization of destination '{name}' timed out after {timeout_ms}ms")]
    InitializationTimeout { name: String, timeout_ms: u64 },

    #[error("Destination '{name}' failed: {source}")]
    Destination {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Writer task failed: {0}")]
    Join(String),
}
