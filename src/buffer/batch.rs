use crate::domain::Message;
use std::time::Instant;
use uuid::Uuid;

/// Per-batch caps imposed by a destination.
///
/// `message_overhead` is added to every message's payload size when checking
/// `max_bytes`, for services that charge a fixed number of bytes per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_count: usize,
    pub max_bytes: usize,
    pub message_overhead: usize,
}

impl BatchLimits {
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            max_count,
            max_bytes,
            message_overhead: 0,
        }
    }

    pub fn with_overhead(mut self, message_overhead: usize) -> Self {
        self.message_overhead = message_overhead;
        self
    }

    /// Size a message occupies in a batch.
    pub fn message_size(&self, message: &Message) -> usize {
        message.byte_len().saturating_add(self.message_overhead)
    }

    pub fn fits_alone(&self, message: &Message) -> bool {
        self.max_count > 0 && self.message_size(message) <= self.max_bytes
    }

    /// Limits left over once `message` has been placed in the batch.
    pub fn remaining_after(&self, message: &Message) -> BatchLimits {
        BatchLimits {
            max_count: self.max_count.saturating_sub(1),
            max_bytes: self.max_bytes.saturating_sub(self.message_size(message)),
            message_overhead: self.message_overhead,
        }
    }
}

/// A group of messages handed to the destination in one call.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    messages: Vec<Message>,
    created_at: Instant,
    total_bytes: usize,
}

impl Batch {
    pub fn new(messages: Vec<Message>, limits: &BatchLimits) -> Self {
        let total_bytes = messages.iter().map(|m| limits.message_size(m)).sum();

        Self {
            id: Uuid::new_v4().to_string(),
            messages,
            created_at: Instant::now(),
            total_bytes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Payload bytes plus per-message overhead.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
