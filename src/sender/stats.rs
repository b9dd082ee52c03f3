// Writer statistics shared between the engine and monitoring readers
//
// Counters are plain atomics; multi-field groups (last batch, last error)
// are replaced as a whole under a short parking_lot lock so readers never
// observe a half-written record.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::backtrace::BacktraceStatus;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of the most recent batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastBatch {
    pub sent: u64,
    pub requeued: u64,
}

/// The most recent reportable error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub message: String,
    /// Causes below the top-level error, joined with ": "
    pub cause: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub backtrace: Option<String>,
}

#[derive(Debug, Default)]
pub struct WriterStatistics {
    messages_sent: AtomicU64,
    messages_oversize: AtomicU64,
    throttled_writes: AtomicU64,
    batches_sent: AtomicU64,
    last_batch: Mutex<LastBatch>,
    last_error: Mutex<Option<LastError>>,
    destination_name: RwLock<String>,
}

impl WriterStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reportable error, replacing the previous one.
    pub fn record_error(&self, message: impl Into<String>, error: Option<&anyhow::Error>) {
        let (cause, backtrace) = match error {
            Some(error) => {
                let causes: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
                let cause = (!causes.is_empty()).then(|| causes.join(": "));
                let backtrace = error.backtrace();
                let backtrace = (backtrace.status() == BacktraceStatus::Captured)
                    .then(|| backtrace.to_string());
                (cause, backtrace)
            }
            None => (None, None),
        };

        *self.last_error.lock() = Some(LastError {
            message: message.into(),
            cause,
            timestamp: Utc::now(),
            backtrace,
        });
    }

    /// Adds `count` successfully delivered messages and one delivered batch.
    pub fn record_sent(&self, count: u64) {
        self.messages_sent.fetch_add(count, Ordering::Relaxed);
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_last_batch(&self, sent: u64, requeued: u64) {
        *self.last_batch.lock() = LastBatch { sent, requeued };
    }

    pub fn record_oversize(&self) {
        self.messages_oversize.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_throttle(&self) {
        self.record_throttles(1);
    }

    pub fn record_throttles(&self, count: u64) {
        if count > 0 {
            self.throttled_writes.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn set_destination_name(&self, name: impl Into<String>) {
        *self.destination_name.write() = name.into();
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_oversize(&self) -> u64 {
        self.messages_oversize.load(Ordering::Relaxed)
    }

    pub fn throttled_writes(&self) -> u64 {
        self.throttled_writes.load(Ordering::Relaxed)
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent.load(Ordering::Relaxed)
    }

    pub fn last_batch(&self) -> LastBatch {
        *self.last_batch.lock()
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.last_error.lock().clone()
    }

    pub fn last_error_message(&self) -> Option<String> {
        self.last_error.lock().as_ref().map(|e| e.message.clone())
    }

    pub fn destination_name(&self) -> String {
        self.destination_name.read().clone()
    }

    /// Point-in-time copy of all counters.
    ///
    /// Queue-derived fields (`messages_discarded`, `messages_queued`) are left
    /// at zero; the writer handle fills them in from its queue.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            destination_name: self.destination_name(),
            messages_sent: self.messages_sent(),
            messages_discarded: 0,
            messages_oversize: self.messages_oversize(),
            messages_queued: 0,
            throttled_writes: self.throttled_writes(),
            batches_sent: self.batches_sent(),
            last_batch: self.last_batch(),
            last_error: self.last_error(),
        }
    }
}

/// Immutable snapshot of writer statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub destination_name: String,
    pub messages_sent: u64,
    pub messages_discarded: u64,
    pub messages_oversize: u64,
    pub messages_queued: u64,
    pub throttled_writes: u64,
    pub batches_sent: u64,
    pub last_batch: LastBatch,
    pub last_error: Option<LastError>,
}

impl StatisticsSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(|e| e.message.as_str())
    }
}
