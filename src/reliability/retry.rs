use crate::app::config::serde_helpers;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetryStrategy {
    #[default]
    ExponentialBackoff,
    LinearBackoff,
    /// Constant poll interval equal to `initial_delay`
    FixedDelay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(with = "serde_helpers", rename = "initial_delay_ms")]
    pub initial_delay: Duration,
    #[serde(with = "serde_helpers", rename = "max_delay_ms")]
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
    /// Overall time budget for one `invoke` call
    #[serde(with = "serde_helpers", rename = "timeout_ms")]
    pub timeout: Duration,
    /// Log throttled attempts at warn level instead of debug
    pub count_throttling: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: true,
            timeout: Duration::from_secs(10),
            count_throttling: false,
        }
    }
}

impl RetryConfig {
    /// Fixed-interval polling without jitter, e.g. waiting for a destination to become active.
    pub fn polling(interval: Duration, timeout: Duration) -> Self {
        Self {
            initial_delay: interval,
            max_delay: interval,
            strategy: RetryStrategy::FixedDelay,
            jitter: false,
            timeout,
            count_throttling: false,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay.is_zero() {
            return Err("initial_delay must be greater than 0".to_string());
        }
        if self.max_delay < self.initial_delay {
            return Err(format!(
                "max_delay ({}ms) must be >= initial_delay ({}ms)",
                self.max_delay.as_millis(),
                self.initial_delay.as_millis()
            ));
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Why an attempt asked to be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The operation has not succeeded yet (e.g. resource still being created)
    Pending,
    /// The remote service rejected the call because of rate limiting
    Throttled,
}

/// Outcome of a single attempt inside [`RetryController::invoke`].
#[derive(Debug)]
pub enum Attempt<T, E> {
    Success(T),
    Retry(RetryReason),
    Fatal(E),
}

impl<T, E> Attempt<T, E> {
    pub fn pending() -> Self {
        Attempt::Retry(RetryReason::Pending)
    }

    pub fn throttled() -> Self {
        Attempt::Retry(RetryReason::Throttled)
    }
}

/// Time-bounded retry loop.
///
/// `invoke` keeps calling the operation until it succeeds, fails fatally, or
/// the overall timeout runs out. Running out of time is not an error: the
/// caller gets `Ok(None)` and decides what giving up means.
#[derive(Debug)]
pub struct RetryController {
    config: RetryConfig,
    cancel: Option<CancellationToken>,
    attempts: AtomicU64,
    throttled: AtomicU64,
}

impl RetryController {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            cancel: None,
            attempts: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
        }
    }

    /// Makes backoff sleeps end early (with `Ok(None)`) once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub async fn invoke<T, E, F, Fut>(&self, mut operation: F) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let deadline = Instant::now() + self.config.timeout;
        let mut attempt: u32 = 0;

        loop {
            self.attempts.fetch_add(1, Ordering::Relaxed);

            match operation().await {
                Attempt::Success(value) => return Ok(Some(value)),
                Attempt::Fatal(error) => return Err(error),
                Attempt::Retry(RetryReason::Throttled) => {
                    self.throttled.fetch_add(1, Ordering::Relaxed);
                    if self.config.count_throttling {
                        warn!(attempt, "Operation throttled, backing off");
                    } else {
                        debug!(attempt, "Operation throttled, backing off");
                    }
                }
                Attempt::Retry(RetryReason::Pending) => {
                    debug!(attempt, "Operation not complete yet, retrying");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    attempts = attempt + 1,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Retry timeout elapsed"
                );
                return Ok(None);
            }

            let wake_at = std::cmp::min(now + self.calculate_delay(attempt), deadline);
            if !self.sleep_until(wake_at).await {
                debug!("Retry loop cancelled");
                return Ok(None);
            }

            attempt = attempt.saturating_add(1);
        }
    }

    /// Returns `false` if the sleep was cut short by cancellation.
    async fn sleep_until(&self, wake_at: Instant) -> bool {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    () = token.cancelled() => false,
                    () = sleep_until(wake_at) => true,
                }
            }
            None => {
                sleep_until(wake_at).await;
                true
            }
        }
    }

    /// Delay before the attempt following `attempt` (0-based), capped at `max_delay`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay;
        let delay = match self.config.strategy {
            RetryStrategy::ExponentialBackoff => {
                let multiplier = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
                base.saturating_mul(multiplier)
            }
            RetryStrategy::LinearBackoff => base.saturating_mul(attempt.saturating_add(1)),
            RetryStrategy::FixedDelay => base,
        };

        let capped = std::cmp::min(delay, self.config.max_delay);

        if self.config.jitter {
            apply_jitter(capped)
        } else {
            capped
        }
    }

    /// Total number of operation calls made through this controller.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn throttled_attempts(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.attempts.store(0, Ordering::Relaxed);
        self.throttled.store(0, Ordering::Relaxed);
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::rng();
    let jitter_factor: f64 = rng.random_range(0.5..1.5); // ±50% jitter
    Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64)
}
