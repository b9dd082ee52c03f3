use super::batch::BatchLimits;
use super::policy::DiscardPolicy;
use crate::domain::Message;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};

/// Bounded, multi-producer / single-consumer message queue.
///
/// Every structural change (append, head re-insertion, trimming) happens
/// under one mutex, so `len() <= capacity` holds whenever the lock is
/// released and a requeued batch can never be overtaken by a concurrent
/// `enqueue`. Producers never block beyond that short critical section.
pub struct MessageQueue {
    inner: Mutex<QueueInner>,
    dropped: AtomicU64,
    available: Notify,
}

struct QueueInner {
    messages: VecDeque<Message>,
    capacity: usize,
    policy: DiscardPolicy,
    /// Set once by `disable()`; later reconfiguration is refused.
    locked: bool,
}

impl QueueInner {
    fn is_disabled(&self) -> bool {
        self.locked || (self.capacity == 0 && self.policy == DiscardPolicy::None)
    }

    /// Applies new settings and trims; a no-op once the queue is locked.
    fn reconfigure(&mut self, capacity: usize, policy: DiscardPolicy) -> u64 {
        if self.locked {
            return 0;
        }
        self.capacity = capacity;
        self.policy = policy;
        self.trim()
    }

    /// Removes messages per policy until the capacity holds; returns how many went.
    fn trim(&mut self) -> u64 {
        if self.is_disabled() {
            let removed = self.messages.len() as u64;
            self.messages.clear();
            return removed;
        }

        let mut removed = 0;
        while self.messages.len() > self.capacity {
            let evicted = match self.policy {
                DiscardPolicy::Oldest => self.messages.pop_front(),
                DiscardPolicy::Newest => self.messages.pop_back(),
                DiscardPolicy::None => None,
            };
            if evicted.is_none() {
                break;
            }
            removed += 1;
        }
        removed
    }
}

impl MessageQueue {
    pub fn new(capacity: usize, policy: DiscardPolicy) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                messages: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
                policy,
                locked: false,
            }),
            dropped: AtomicU64::new(0),
            available: Notify::new(),
        }
    }

    /// Appends a message, shedding one per the discard policy if the queue overflows.
    ///
    /// Returns `true` if the message is still queued afterwards.
    pub fn enqueue(&self, message: Message) -> bool {
        let retained = {
            let mut inner = self.inner.lock();

            if inner.is_disabled() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }

            inner.messages.push_back(message);
            if inner.messages.len() <= inner.capacity {
                true
            } else {
                match inner.policy {
                    DiscardPolicy::Oldest => {
                        inner.messages.pop_front();
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        inner.capacity > 0
                    }
                    DiscardPolicy::Newest => {
                        inner.messages.pop_back();
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        false
                    }
                    DiscardPolicy::None => true,
                }
            }
        };

        if retained {
            self.available.notify_one();
        }
        retained
    }

    /// Puts previously dequeued messages back at the head, in their original order.
    pub fn requeue(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }

        let has_messages = {
            let mut inner = self.inner.lock();
            for message in messages.into_iter().rev() {
                inner.messages.push_front(message);
            }
            let removed = inner.trim();
            if removed > 0 {
                self.dropped.fetch_add(removed, Ordering::Relaxed);
            }
            !inner.messages.is_empty()
        };

        if has_messages {
            self.available.notify_one();
        }
    }

    pub fn try_dequeue(&self) -> Option<Message> {
        self.inner.lock().messages.pop_front()
    }

    /// Waits up to `timeout` for a message to become available.
    ///
    /// Intended for the single consumer; the wake-up permit stored by
    /// `Notify::notify_one` covers an enqueue racing with the wait.
    pub async fn dequeue_timeout(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.try_dequeue() {
                return Some(message);
            }
            if timeout_at(deadline, self.available.notified()).await.is_err() {
                return self.try_dequeue();
            }
        }
    }

    /// Removes as many queued messages as fit under both caps, in FIFO order.
    ///
    /// Stops at the first message that would exceed either cap; that message
    /// stays at the head for the next call.
    pub fn drain_available(&self, limits: BatchLimits) -> Vec<Message> {
        let mut inner = self.inner.lock();
        let mut drained = Vec::new();
        let mut bytes = 0usize;

        while drained.len() < limits.max_count {
            let Some(head) = inner.messages.front() else {
                break;
            };
            let size = limits.message_size(head);
            if bytes.saturating_add(size) > limits.max_bytes {
                break;
            }
            bytes += size;
            if let Some(message) = inner.messages.pop_front() {
                drained.push(message);
            }
        }

        drained
    }

    /// Removes and returns everything currently queued.
    pub fn drain_all(&self) -> Vec<Message> {
        self.inner.lock().messages.drain(..).collect()
    }

    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.lock();
        let policy = inner.policy;
        let removed = inner.reconfigure(capacity, policy);
        self.dropped.fetch_add(removed, Ordering::Relaxed);
    }

    pub fn set_discard_policy(&self, policy: DiscardPolicy) {
        let mut inner = self.inner.lock();
        let capacity = inner.capacity;
        let removed = inner.reconfigure(capacity, policy);
        self.dropped.fetch_add(removed, Ordering::Relaxed);
    }

    /// Changes capacity and policy together, trimming once with the new settings.
    ///
    /// Ignored after [`disable`](Self::disable).
    pub fn configure(&self, capacity: usize, policy: DiscardPolicy) {
        let mut inner = self.inner.lock();
        let removed = inner.reconfigure(capacity, policy);
        self.dropped.fetch_add(removed, Ordering::Relaxed);
    }

    /// Permanently stops buffering; queued messages count as dropped.
    ///
    /// Capacity and policy can no longer be changed afterwards.
    pub fn disable(&self) {
        let mut inner = self.inner.lock();
        let removed = inner.reconfigure(0, DiscardPolicy::None);
        inner.locked = true;
        self.dropped.fetch_add(removed, Ordering::Relaxed);
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.lock().is_disabled()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn discard_policy(&self) -> DiscardPolicy {
        self.inner.lock().policy
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MessageQueue")
            .field("len", &inner.messages.len())
            .field("capacity", &inner.capacity)
            .field("policy", &inner.policy)
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish()
    }
}
