use super::config::{LogFormat, LogLevel, LoggingConfig};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("Invalid log level '{input}'. Valid levels: error, warn, info, debug, trace")]
    InvalidLogLevel { input: String },

    #[error("Invalid directive format '{input}'. Expected: 'target=level'")]
    InvalidDirectiveFormat { input: String },

    #[error("Empty target in directive '{input}'")]
    EmptyTarget { input: String },

    #[error("Logging initialization failed: {details}")]
    LoggingInitFailed {
        details: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A `target=level` filter directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirective {
    pub target: String,
    pub level: LogLevel,
}

impl LogDirective {
    pub fn new(target: impl Into<String>, level: LogLevel) -> Self {
        Self {
            target: target.into(),
            level,
        }
    }

    pub fn parse(directive: &str) -> Result<Self, InitializationError> {
        let Some((target, level)) = directive.split_once('=') else {
            return Err(InitializationError::InvalidDirectiveFormat {
                input: directive.to_string(),
            });
        };

        let target = target.trim();
        if target.is_empty() {
            return Err(InitializationError::EmptyTarget {
                input: directive.to_string(),
            });
        }

        let level = level
            .parse::<LogLevel>()
            .map_err(|_| InitializationError::InvalidLogLevel {
                input: level.trim().to_string(),
            })?;

        Ok(LogDirective::new(target, level))
    }

    pub fn to_filter_string(&self) -> String {
        format!("{}={}", self.target, self.level.as_str())
    }
}

/// Builds the `EnvFilter` and installs the global tracing subscriber.
pub struct LoggingSystem {
    directives: Arc<RwLock<Vec<LogDirective>>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn add_directive(&self, directive: &str) -> Result<(), InitializationError> {
        let directive = LogDirective::parse(directive)?;
        self.directives.write().push(directive);
        Ok(())
    }

    /// Quiets chatty transport crates typically pulled in by destination clients.
    pub fn add_default_directives(&self) {
        let defaults = [
            ("hyper", LogLevel::Warn),
            ("h2", LogLevel::Warn),
            ("rustls", LogLevel::Warn),
            ("aws_smithy_runtime", LogLevel::Warn),
            ("aws_config", LogLevel::Warn),
        ];

        let mut directives = self.directives.write();
        for (target, level) in defaults {
            directives.push(LogDirective::new(target, level));
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();

        let mut filter_parts = Vec::with_capacity(directives.len() + 1);
        filter_parts.push(default_level.as_str().to_string());
        filter_parts.extend(directives.iter().map(LogDirective::to_filter_string));

        filter_parts.join(",")
    }

    /// Installs the global subscriber.
    ///
    /// Uses `try_init`, so a second call returns an error instead of panicking.
    pub fn initialize_tracing(
        &self,
        level: LogLevel,
        format: LogFormat,
    ) -> Result<(), InitializationError> {
        let filter_string = self.build_filter_string(level);
        let env_filter = EnvFilter::try_new(&filter_string).map_err(|e| {
            InitializationError::LoggingInitFailed {
                details: format!("Failed to create EnvFilter with '{filter_string}'"),
                source: Box::new(e),
            }
        })?;

        let result = match format {
            LogFormat::Compact => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .compact(),
                )
                .try_init(),
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_current_span(true))
                .try_init(),
        };

        result.map_err(|e| InitializationError::LoggingInitFailed {
            details: "Failed to set global tracing subscriber".to_string(),
            source: Box::new(e),
        })
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Sets up tracing from a [`LoggingConfig`]: default quiet directives, then
/// the configured ones, then the global subscriber.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), InitializationError> {
    let system = LoggingSystem::new();
    system.add_default_directives();
    for directive in &config.directives {
        system.add_directive(directive)?;
    }
    system.initialize_tracing(config.log_level, config.format)
}
