//! Application-facing setup: configuration loading and tracing initialization.

pub mod config;
pub mod logging_system;

pub use config::{ConfigError, LogFormat, LogLevel, LoggingConfig, WriterConfig};
pub use logging_system::{InitializationError, LogDirective, LoggingSystem, init_tracing};
