use super::state::WriterState;
use crate::buffer::{DiscardPolicy, MessageQueue, OversizeAction};
use crate::domain::{Message, WriterError};
use crate::sender::{StatisticsSnapshot, WriterStatistics};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// State shared between the engine task and every handle.
pub(crate) struct WriterShared {
    pub(crate) queue: MessageQueue,
    pub(crate) stats: WriterStatistics,
    pub(crate) state: watch::Sender<WriterState>,
    pub(crate) cancel: CancellationToken,
    pub(crate) task: Mutex<Option<JoinHandle<()>>>,
    pub(crate) max_message_bytes: usize,
    pub(crate) oversize_action: OversizeAction,
}

impl WriterShared {
    pub(crate) fn set_state(&self, state: WriterState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Writer state changed");
        }
    }

    pub(crate) fn state(&self) -> WriterState {
        *self.state.borrow()
    }
}

/// Producer-side and lifecycle access to a running writer.
///
/// Cheap to clone; every clone talks to the same engine.
#[derive(Clone)]
pub struct LogWriterHandle {
    shared: Arc<WriterShared>,
}

impl LogWriterHandle {
    pub(crate) fn new(shared: Arc<WriterShared>) -> Self {
        Self { shared }
    }

    /// Queues a message for delivery.
    ///
    /// Messages larger than the destination's per-message limit are
    /// truncated or dropped according to the configured [`OversizeAction`]
    /// and counted as oversize either way. Returns `true` if the message
    /// ended up in the queue. Never blocks on the engine.
    pub fn add_message(&self, message: Message) -> bool {
        let limit = self.shared.max_message_bytes;

        let message = if message.is_oversize(limit) {
            self.shared.stats.record_oversize();
            match self.shared.oversize_action {
                OversizeAction::Truncate => {
                    warn!(
                        size = message.byte_len(),
                        limit, "Truncating oversize message"
                    );
                    message.truncate(limit)
                }
                OversizeAction::Discard => {
                    warn!(
                        size = message.byte_len(),
                        limit, "Discarding oversize message"
                    );
                    return false;
                }
            }
        } else {
            message
        };

        self.shared.queue.enqueue(message)
    }

    /// Changes queue capacity and discard policy.
    ///
    /// Has no effect once the writer failed: the queue stays disabled.
    pub fn configure_queue(&self, capacity: usize, policy: DiscardPolicy) {
        if self.shared.queue.is_disabled() {
            debug!("Queue disabled, ignoring reconfiguration");
        }
        self.shared.queue.configure(capacity, policy);
    }

    /// Asks the engine to flush and stop. Returns immediately.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }

    /// Waits for the engine to finish.
    pub async fn join(&self) -> Result<(), WriterError> {
        let task = self.shared.task.lock().take();
        if let Some(task) = task {
            return task.await.map_err(|e| WriterError::Join(e.to_string()));
        }

        // Not spawned through `start()`: either never run, or run by the caller.
        if self.state() == WriterState::Starting {
            return Ok(());
        }
        let mut state = self.shared.state.subscribe();
        let _ = state.wait_for(WriterState::is_terminal).await;
        Ok(())
    }

    /// `stop()` followed by `join()`.
    pub async fn shutdown(&self) -> Result<(), WriterError> {
        self.stop();
        self.join().await
    }

    pub fn state(&self) -> WriterState {
        self.shared.state()
    }

    /// Subscribes to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<WriterState> {
        self.shared.state.subscribe()
    }

    /// Waits until initialization has finished one way or another.
    ///
    /// Returns `true` if the writer became ready within `timeout`.
    pub async fn wait_until_initialized(&self, timeout: Duration) -> bool {
        let mut state = self.shared.state.subscribe();
        let settled = state.wait_for(|s| !matches!(s, WriterState::Starting | WriterState::Initializing));

        match tokio::time::timeout(timeout, settled).await {
            Ok(Ok(state)) => state.is_operational(),
            _ => false,
        }
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        let mut snapshot = self.shared.stats.snapshot();
        snapshot.messages_discarded = self.shared.queue.dropped_count();
        snapshot.messages_queued = self.shared.queue.len() as u64;
        snapshot
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    pub fn discard_policy(&self) -> DiscardPolicy {
        self.shared.queue.discard_policy()
    }

    pub fn max_message_bytes(&self) -> usize {
        self.shared.max_message_bytes
    }
}

impl std::fmt::Debug for LogWriterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriterHandle")
            .field("state", &self.state())
            .field("queue", &self.shared.queue)
            .finish()
    }
}
