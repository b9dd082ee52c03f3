use super::{ConfigError, WriterConfig};
use std::time::Duration;

impl WriterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_delay < Duration::from_millis(1) {
            return Err(ConfigError::InvalidConfig(
                "Batch delay must be at least 1ms".to_string(),
            ));
        }

        if self.discard_threshold == 0 {
            return Err(ConfigError::InvalidConfig(
                "Discard threshold must be greater than 0".to_string(),
            ));
        }

        if self.initialization_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Initialization timeout must be greater than 0".to_string(),
            ));
        }

        self.init_retry
            .validate()
            .map_err(|e| ConfigError::InvalidConfig(format!("Invalid init_retry: {e}")))?;
        self.send_retry
            .validate()
            .map_err(|e| ConfigError::InvalidConfig(format!("Invalid send_retry: {e}")))?;

        for directive in &self.logging.directives {
            if !directive.contains('=') {
                return Err(ConfigError::InvalidConfig(format!(
                    "Invalid log directive '{directive}'. Expected: 'target=level'"
                )));
            }
        }

        Ok(())
    }
}
