use crate::buffer::BatchLimits;
use crate::domain::Message;
use crate::reliability::{Attempt, RetryReason};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`Destination`] calls.
pub type DestinationFuture<'a, T> = Pin<Box<dyn Future<Output = DestinationResult<T>> + Send + 'a>>;

pub type DestinationResult<T> = Result<T, DestinationError>;

/// Existence/readiness of the remote destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationStatus {
    Active,
    DoesNotExist,
    /// Being created or updated, possibly by another client
    Transitional,
    /// The status call itself was throttled
    Unknown,
}

impl fmt::Display for DestinationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DestinationStatus::Active => "active",
            DestinationStatus::DoesNotExist => "does_not_exist",
            DestinationStatus::Transitional => "transitional",
            DestinationStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum DestinationError {
    /// Transient service condition; the same call may succeed later.
    #[error("Retryable destination error: {reason}")]
    Retryable { reason: String, throttled: bool },

    #[error("Fatal destination error: {0:#}")]
    Fatal(anyhow::Error),
}

impl DestinationError {
    pub fn throttled(reason: impl Into<String>) -> Self {
        DestinationError::Retryable {
            reason: reason.into(),
            throttled: true,
        }
    }

    pub fn retryable(reason: impl Into<String>) -> Self {
        DestinationError::Retryable {
            reason: reason.into(),
            throttled: false,
        }
    }

    pub fn fatal(error: impl Into<anyhow::Error>) -> Self {
        DestinationError::Fatal(error.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DestinationError::Retryable { .. })
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, DestinationError::Retryable { throttled: true, .. })
    }

    /// Maps the error onto the retry controller's outcome type.
    pub fn into_attempt<T>(self) -> Attempt<T, anyhow::Error> {
        match self {
            DestinationError::Retryable { throttled: true, .. } => {
                Attempt::Retry(RetryReason::Throttled)
            }
            DestinationError::Retryable { .. } => Attempt::Retry(RetryReason::Pending),
            DestinationError::Fatal(error) => Attempt::Fatal(error),
        }
    }
}

/// The remote service a writer delivers to.
///
/// Implementations wrap a concrete client (a grouped log stream, a sharded
/// stream, a pub/sub topic, ...). The writer engine is the only caller and
/// never issues two calls concurrently. The trait is dyn-compatible by using
/// boxed futures instead of `impl Future`.
pub trait Destination: Send + Sync + 'static {
    /// Resolved destination name, used in logs, errors and statistics.
    fn name(&self) -> &str;

    /// Checks configuration (names, keys, sizes) before any remote call.
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }

    fn batch_limits(&self) -> BatchLimits;

    fn max_message_bytes(&self) -> usize;

    fn status(&self) -> DestinationFuture<'_, DestinationStatus>;

    /// Creates the destination; "already exists" must not be an error.
    fn create(&self) -> DestinationFuture<'_, ()>;

    /// Applies retention/shard style settings after creation.
    fn configure_limits(&self) -> DestinationFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Sends one batch and returns the messages the service rejected.
    ///
    /// An `Err` means nothing in the batch was accepted.
    fn send_batch<'a>(&'a self, messages: &'a [Message]) -> DestinationFuture<'a, Vec<Message>>;

    /// Releases connection resources.
    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let throttled = DestinationError::throttled("rate exceeded");
        assert!(throttled.is_retryable());
        assert!(throttled.is_throttled());
        assert!(matches!(
            throttled.into_attempt::<()>(),
            Attempt::Retry(RetryReason::Throttled)
        ));

        let pending = DestinationError::retryable("resource in use");
        assert!(pending.is_retryable());
        assert!(!pending.is_throttled());
        assert!(matches!(
            pending.into_attempt::<()>(),
            Attempt::Retry(RetryReason::Pending)
        ));

        let fatal = DestinationError::fatal(anyhow::anyhow!("access denied"));
        assert!(!fatal.is_retryable());
        assert!(matches!(fatal.into_attempt::<()>(), Attempt::Fatal(_)));
    }

    #[test]
    fn test_fatal_display_includes_cause_chain() {
        let error = DestinationError::fatal(
            anyhow::anyhow!("connection reset").context("PutRecords failed"),
        );
        assert_eq!(
            error.to_string(),
            "Fatal destination error: PutRecords failed: connection reset"
        );
    }
}
