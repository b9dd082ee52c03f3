use super::serde_helpers::{self, load_env_millis, load_env_var};
use super::{ConfigError, LogFormat, LogLevel};
use crate::buffer::{DiscardPolicy, OversizeAction};
use crate::reliability::{RetryConfig, RetryStrategy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tracing output settings used by [`crate::app::LoggingSystem`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: LogLevel,
    pub format: LogFormat,
    /// Extra `target=level` directives appended to the filter
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Longest time the engine waits for the first message of a batch
    #[serde(with = "serde_helpers", rename = "batch_delay_ms")]
    pub batch_delay: Duration,
    /// Queue capacity
    pub discard_threshold: usize,
    pub discard_action: DiscardPolicy,
    #[serde(with = "serde_helpers", rename = "initialization_timeout_ms")]
    pub initialization_timeout: Duration,
    /// Create the destination if it does not exist
    pub auto_create: bool,
    /// Send every message as a batch of one
    pub synchronous: bool,
    pub oversize_action: OversizeAction,
    /// Log batch ids and sizes at debug level
    pub enable_batch_logging: bool,
    pub init_retry: RetryConfig,
    pub send_retry: RetryConfig,
    pub logging: LoggingConfig,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_millis(2000),
            discard_threshold: 10_000,
            discard_action: DiscardPolicy::Oldest,
            initialization_timeout: Duration::from_secs(60),
            auto_create: false,
            synchronous: false,
            oversize_action: OversizeAction::Truncate,
            enable_batch_logging: false,
            init_retry: RetryConfig {
                initial_delay: Duration::from_millis(250),
                max_delay: Duration::from_secs(2),
                strategy: RetryStrategy::ExponentialBackoff,
                jitter: true,
                timeout: Duration::from_secs(60),
                count_throttling: false,
            },
            send_retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl WriterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: WriterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from `RASK_WRITER_*` variables.
    ///
    /// `RASK_WRITER_CONFIG` holds a whole TOML document and takes precedence
    /// over the individual variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(content) = std::env::var("RASK_WRITER_CONFIG") {
            return Self::from_toml_str(&content);
        }

        let mut config = WriterConfig::default();

        load_env_millis("RASK_WRITER_BATCH_DELAY_MS", &mut config.batch_delay)?;
        load_env_var("RASK_WRITER_DISCARD_THRESHOLD", &mut config.discard_threshold)?;
        load_env_var("RASK_WRITER_DISCARD_ACTION", &mut config.discard_action)?;
        load_env_millis(
            "RASK_WRITER_INITIALIZATION_TIMEOUT_MS",
            &mut config.initialization_timeout,
        )?;
        load_env_var("RASK_WRITER_AUTO_CREATE", &mut config.auto_create)?;
        load_env_var("RASK_WRITER_SYNCHRONOUS", &mut config.synchronous)?;
        load_env_var("RASK_WRITER_OVERSIZE_ACTION", &mut config.oversize_action)?;
        load_env_var(
            "RASK_WRITER_ENABLE_BATCH_LOGGING",
            &mut config.enable_batch_logging,
        )?;
        load_env_millis("RASK_WRITER_SEND_TIMEOUT_MS", &mut config.send_retry.timeout)?;
        load_env_var(
            "RASK_WRITER_COUNT_THROTTLING",
            &mut config.send_retry.count_throttling,
        )?;
        config.init_retry.count_throttling = config.send_retry.count_throttling;
        load_env_var("RASK_WRITER_LOG_LEVEL", &mut config.logging.log_level)?;
        load_env_var("RASK_WRITER_LOG_FORMAT", &mut config.logging.format)?;

        config.validate()?;
        Ok(config)
    }
}
