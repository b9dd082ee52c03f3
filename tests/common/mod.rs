//! Shared test support: a scriptable in-memory destination.
#![allow(dead_code)]

use parking_lot::Mutex;
use rask_log_writer::{
    BatchLimits, Destination, DestinationError, DestinationFuture, DestinationResult,
    DestinationStatus, Message, RetryConfig, WriterConfig,
};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type SendBehavior = Box<dyn FnMut(usize, &[Message]) -> DestinationResult<Vec<Message>> + Send>;

/// Counters and recordings observed by tests after the destination moved into a writer.
#[derive(Default)]
pub struct CallRecorder {
    pub status_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub configure_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub shutdown_calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    delivered: Mutex<Vec<Message>>,
}

impl CallRecorder {
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn configure_calls(&self) -> usize {
        self.configure_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    /// Size of every batch handed to `send_batch`, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }

    /// Messages the destination accepted, in delivery order.
    pub fn delivered(&self) -> Vec<Message> {
        self.delivered.lock().clone()
    }
}

/// In-memory destination driven by a status script and a send behavior.
pub struct FakeDestination {
    name: String,
    limits: BatchLimits,
    max_message_bytes: usize,
    problems: Vec<String>,
    statuses: Mutex<VecDeque<DestinationStatus>>,
    status_failure: Option<String>,
    send_behavior: Mutex<SendBehavior>,
    recorder: Arc<CallRecorder>,
}

impl FakeDestination {
    /// An already active destination that accepts everything.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            limits: BatchLimits::new(10_000, 1_048_576).with_overhead(26),
            max_message_bytes: 262_118,
            problems: Vec::new(),
            statuses: Mutex::new(VecDeque::from([DestinationStatus::Active])),
            status_failure: None,
            send_behavior: Mutex::new(Box::new(|_, _| Ok(Vec::new()))),
            recorder: Arc::new(CallRecorder::default()),
        }
    }

    /// Status responses in order; the last one repeats forever.
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = DestinationStatus>) -> Self {
        *self.statuses.lock() = statuses.into_iter().collect();
        self
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    pub fn with_validation_problems(mut self, problems: &[&str]) -> Self {
        self.problems = problems.iter().map(ToString::to_string).collect();
        self
    }

    /// Every `status()` call fails fatally with this message.
    pub fn with_status_failure(mut self, message: &str) -> Self {
        self.status_failure = Some(message.to_string());
        self
    }

    /// `behavior(call_index, batch)` decides the outcome of each `send_batch` call.
    pub fn with_send_behavior<F>(self, behavior: F) -> Self
    where
        F: FnMut(usize, &[Message]) -> DestinationResult<Vec<Message>> + Send + 'static,
    {
        *self.send_behavior.lock() = Box::new(behavior);
        self
    }

    pub fn recorder(&self) -> Arc<CallRecorder> {
        self.recorder.clone()
    }

    fn next_status(&self) -> DestinationStatus {
        let mut statuses = self.statuses.lock();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap_or(DestinationStatus::Active)
        } else {
            statuses.front().copied().unwrap_or(DestinationStatus::Active)
        }
    }
}

impl Destination for FakeDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(self.problems.clone())
        }
    }

    fn batch_limits(&self) -> BatchLimits {
        self.limits
    }

    fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    fn status(&self) -> DestinationFuture<'_, DestinationStatus> {
        Box::pin(async move {
            self.recorder.status_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.status_failure {
                return Err(DestinationError::fatal(
                    anyhow::anyhow!("{message}").context("DescribeDestination failed"),
                ));
            }
            Ok(self.next_status())
        })
    }

    fn create(&self) -> DestinationFuture<'_, ()> {
        Box::pin(async move {
            self.recorder.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn configure_limits(&self) -> DestinationFuture<'_, ()> {
        Box::pin(async move {
            self.recorder.configure_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn send_batch<'a>(&'a self, messages: &'a [Message]) -> DestinationFuture<'a, Vec<Message>> {
        Box::pin(async move {
            let call = self.recorder.send_calls.fetch_add(1, Ordering::SeqCst);
            self.recorder.batch_sizes.lock().push(messages.len());

            let result = {
                let mut behavior = self.send_behavior.lock();
                (*behavior)(call, messages)
            };

            if let Ok(failed) = &result {
                let mut delivered = self.recorder.delivered.lock();
                delivered.extend(messages.iter().filter(|m| !failed.contains(m)).cloned());
            }
            result
        })
    }

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.recorder.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// Writer configuration with short delays suitable for tests.
pub fn fast_config() -> WriterConfig {
    WriterConfig {
        batch_delay: Duration::from_millis(50),
        initialization_timeout: Duration::from_secs(5),
        init_retry: RetryConfig::polling(Duration::from_millis(10), Duration::from_secs(2)),
        send_retry: RetryConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            jitter: false,
            timeout: Duration::from_secs(1),
            ..RetryConfig::default()
        },
        ..WriterConfig::default()
    }
}

pub fn messages(count: usize, payload_len: usize) -> Vec<Message> {
    (0..count)
        .map(|i| {
            let prefix = format!("{i:06}-");
            let filler = "x".repeat(payload_len.saturating_sub(prefix.len()));
            Message::new(1_700_000_000_000 + i as i64, format!("{prefix}{filler}"))
        })
        .collect()
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
