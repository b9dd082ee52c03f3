use chrono::{DateTime, TimeZone, Utc};
use std::cmp::Ordering;
use std::sync::Arc;

/// A single log message waiting to be written to a destination.
///
/// Messages are immutable once built. The payload is shared, so cloning a
/// message (e.g. when a destination hands back the records it rejected) does
/// not copy the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    timestamp: i64,
    payload: Arc<str>,
    byte_len: usize,
}

impl Message {
    /// Builds a message with an explicit timestamp (milliseconds since the epoch).
    pub fn new(timestamp: i64, payload: impl Into<Arc<str>>) -> Self {
        let payload = payload.into();
        let byte_len = payload.len();
        Self {
            timestamp,
            payload,
            byte_len,
        }
    }

    /// Builds a message stamped with the current wall-clock time.
    pub fn now(payload: impl Into<Arc<str>>) -> Self {
        Self::new(Utc::now().timestamp_millis(), payload)
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// UTF-8 encoded size of the payload.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn is_oversize(&self, limit: usize) -> bool {
        self.byte_len > limit
    }

    /// Returns a copy whose payload fits in `max_bytes`, cut on a char boundary.
    pub fn truncate(&self, max_bytes: usize) -> Message {
        if self.byte_len <= max_bytes {
            return self.clone();
        }

        let mut end = max_bytes;
        while end > 0 && !self.payload.is_char_boundary(end) {
            end -= 1;
        }

        Message::new(self.timestamp, &self.payload[..end])
    }
}

impl Ord for Message {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.payload.cmp(&other.payload))
    }
}

impl PartialOrd for Message {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
