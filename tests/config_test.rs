use rask_log_writer::app::{LogFormat, LogLevel};
use rask_log_writer::{ConfigError, DiscardPolicy, OversizeAction, RetryStrategy, WriterConfig};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_test::{assert_err, assert_ok};

const ENV_VARS: &[&str] = &[
    "RASK_WRITER_CONFIG",
    "RASK_WRITER_BATCH_DELAY_MS",
    "RASK_WRITER_DISCARD_THRESHOLD",
    "RASK_WRITER_DISCARD_ACTION",
    "RASK_WRITER_INITIALIZATION_TIMEOUT_MS",
    "RASK_WRITER_AUTO_CREATE",
    "RASK_WRITER_SYNCHRONOUS",
    "RASK_WRITER_OVERSIZE_ACTION",
    "RASK_WRITER_ENABLE_BATCH_LOGGING",
    "RASK_WRITER_SEND_TIMEOUT_MS",
    "RASK_WRITER_COUNT_THROTTLING",
    "RASK_WRITER_LOG_LEVEL",
    "RASK_WRITER_LOG_FORMAT",
];

fn clear_env() {
    for name in ENV_VARS {
        // SAFETY: tests touching the environment run serially
        unsafe { std::env::remove_var(name) };
    }
}

fn set_env(name: &str, value: &str) {
    // SAFETY: tests touching the environment run serially
    unsafe { std::env::set_var(name, value) };
}

#[test]
fn test_defaults() {
    let config = WriterConfig::default();

    assert_eq!(config.batch_delay, Duration::from_millis(2000));
    assert_eq!(config.discard_threshold, 10_000);
    assert_eq!(config.discard_action, DiscardPolicy::Oldest);
    assert_eq!(config.initialization_timeout, Duration::from_secs(60));
    assert!(!config.auto_create);
    assert!(!config.synchronous);
    assert_eq!(config.oversize_action, OversizeAction::Truncate);
    assert!(!config.enable_batch_logging);
    assert_eq!(config.logging.log_level, LogLevel::Info);
}

#[test]
fn test_from_file_reads_toml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
batch_delay_ms = 500
discard_threshold = 250
discard_action = "newest"
auto_create = true
oversize_action = "discard"

[send_retry]
initial_delay_ms = 50
max_delay_ms = 1000
strategy = "LinearBackoff"
jitter = false
timeout_ms = 5000
count_throttling = true

[logging]
log_level = "debug"
format = "json"
directives = ["hyper=warn"]
"#
    )
    .unwrap();

    let config = assert_ok!(WriterConfig::from_file(file.path()));

    assert_eq!(config.batch_delay, Duration::from_millis(500));
    assert_eq!(config.discard_threshold, 250);
    assert_eq!(config.discard_action, DiscardPolicy::Newest);
    assert!(config.auto_create);
    assert_eq!(config.oversize_action, OversizeAction::Discard);
    assert_eq!(config.send_retry.strategy, RetryStrategy::LinearBackoff);
    assert_eq!(config.send_retry.timeout, Duration::from_secs(5));
    assert!(config.send_retry.count_throttling);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.directives, vec!["hyper=warn".to_string()]);

    // Sections left out keep their defaults
    assert_eq!(config.init_retry, WriterConfig::default().init_retry);
    assert_eq!(config.initialization_timeout, Duration::from_secs(60));
}

#[test]
fn test_from_file_missing_file() {
    let result = WriterConfig::from_file("/nonexistent/rask-writer.toml");
    assert!(matches!(result, Err(ConfigError::FileError(_))));
}

#[test]
fn test_from_toml_rejects_invalid_values() {
    assert!(matches!(
        WriterConfig::from_toml_str("discard_action = \"sometimes\""),
        Err(ConfigError::ParseError(_))
    ));

    let err = assert_err!(WriterConfig::from_toml_str("discard_threshold = 0"));
    assert!(err.to_string().contains("Discard threshold"));
}

#[test]
#[serial]
fn test_from_env_overrides_defaults() {
    clear_env();
    set_env("RASK_WRITER_BATCH_DELAY_MS", "750");
    set_env("RASK_WRITER_DISCARD_THRESHOLD", "42");
    set_env("RASK_WRITER_DISCARD_ACTION", "none");
    set_env("RASK_WRITER_AUTO_CREATE", "true");
    set_env("RASK_WRITER_SYNCHRONOUS", "true");
    set_env("RASK_WRITER_SEND_TIMEOUT_MS", "3000");
    set_env("RASK_WRITER_COUNT_THROTTLING", "true");
    set_env("RASK_WRITER_LOG_LEVEL", "warn");

    let config = WriterConfig::from_env();
    clear_env();
    let config = assert_ok!(config);

    assert_eq!(config.batch_delay, Duration::from_millis(750));
    assert_eq!(config.discard_threshold, 42);
    assert_eq!(config.discard_action, DiscardPolicy::None);
    assert!(config.auto_create);
    assert!(config.synchronous);
    assert_eq!(config.send_retry.timeout, Duration::from_secs(3));
    assert!(config.send_retry.count_throttling);
    assert!(config.init_retry.count_throttling);
    assert_eq!(config.logging.log_level, LogLevel::Warn);
}

#[test]
#[serial]
fn test_from_env_rejects_unparsable_value() {
    clear_env();
    set_env("RASK_WRITER_DISCARD_THRESHOLD", "lots");

    let result = WriterConfig::from_env();
    clear_env();

    match result {
        Err(ConfigError::EnvError(message)) => {
            assert!(message.contains("RASK_WRITER_DISCARD_THRESHOLD"));
        }
        other => panic!("expected EnvError, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_from_env_whole_document() {
    clear_env();
    set_env("RASK_WRITER_CONFIG", "batch_delay_ms = 100\nsynchronous = true");
    // Individual variables are ignored when a whole document is given
    set_env("RASK_WRITER_BATCH_DELAY_MS", "9999");

    let config = WriterConfig::from_env();
    clear_env();
    let config = assert_ok!(config);

    assert_eq!(config.batch_delay, Duration::from_millis(100));
    assert!(config.synchronous);
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = WriterConfig {
        auto_create: true,
        discard_action: DiscardPolicy::Newest,
        ..WriterConfig::default()
    };

    let text = toml::to_string(&config).unwrap();
    assert!(text.contains("batch_delay_ms = 2000"));
    let parsed = assert_ok!(WriterConfig::from_toml_str(&text));
    assert_eq!(parsed, config);
}
