use super::handle::{LogWriterHandle, WriterShared};
use super::state::WriterState;
use crate::app::WriterConfig;
use crate::buffer::{Batch, BatchLimits, MessageQueue};
use crate::domain::{Message, WriterError};
use crate::reliability::{Attempt, RetryController};
use crate::sender::{Destination, DestinationStatus, WriterStatistics};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Background engine that moves queued messages to a [`Destination`].
///
/// Build it with [`LogWriter::new`], grab a [`LogWriterHandle`] for
/// producers, then either [`start`](LogWriter::start) it on a tokio task or
/// await [`run`](LogWriter::run) on a task of your choosing. The engine is
/// the only caller of the destination.
pub struct LogWriter<D: Destination> {
    config: WriterConfig,
    destination: D,
    limits: BatchLimits,
    shared: Arc<WriterShared>,
}

impl<D: Destination> LogWriter<D> {
    pub fn new(config: WriterConfig, destination: D) -> Result<Self, WriterError> {
        config.validate()?;

        let mut limits = destination.batch_limits();
        if config.synchronous {
            limits.max_count = limits.max_count.min(1);
        }

        let (state, _) = watch::channel(WriterState::Starting);
        let shared = Arc::new(WriterShared {
            queue: MessageQueue::new(config.discard_threshold, config.discard_action),
            stats: WriterStatistics::new(),
            state,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            max_message_bytes: destination.max_message_bytes(),
            oversize_action: config.oversize_action,
        });
        shared.stats.set_destination_name(destination.name());

        Ok(Self {
            config,
            destination,
            limits,
            shared,
        })
    }

    pub fn handle(&self) -> LogWriterHandle {
        LogWriterHandle::new(self.shared.clone())
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    /// Spawns the engine on the current tokio runtime.
    pub fn start(self) -> LogWriterHandle {
        let handle = self.handle();
        let shared = self.shared.clone();
        let task = tokio::spawn(self.run());
        *shared.task.lock() = Some(task);
        handle
    }

    /// Runs the engine to completion: initialization, main loop, final flush.
    pub async fn run(self) {
        let span = info_span!("log_writer", destination = %self.destination.name());
        async move {
            info!("Log writer starting");

            if !self.initialize().await {
                return;
            }

            self.shared.set_state(WriterState::Ready);
            info!(
                max_count = self.limits.max_count,
                max_bytes = self.limits.max_bytes,
                "Destination ready"
            );

            self.process_loop().await;
            self.stop_and_flush().await;
        }
        .instrument(span)
        .await;
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Returns `true` if the main loop should run.
    async fn initialize(&self) -> bool {
        if self.shared.cancel.is_cancelled() {
            self.finish_stopped().await;
            return false;
        }

        self.shared.set_state(WriterState::Initializing);

        let controller = RetryController::new(self.config.init_retry.clone())
            .with_cancellation(self.shared.cancel.clone());
        let timeout = self.config.initialization_timeout;
        let outcome =
            tokio::time::timeout(timeout, self.ensure_destination_available(&controller)).await;

        // Counted on every path, including a timeout that dropped the handshake
        self.shared
            .stats
            .record_throttles(controller.throttled_attempts());

        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(_)) if self.shared.cancel.is_cancelled() => {
                info!("Stopped during initialization");
                self.finish_stopped().await;
                false
            }
            Ok(Err(e)) => {
                self.fail(e).await;
                false
            }
            Err(_) => {
                self.fail(WriterError::InitializationTimeout {
                    name: self.destination.name().to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
                .await;
                false
            }
        }
    }

    /// Validates configuration, then makes sure the destination exists and is active.
    async fn ensure_destination_available(
        &self,
        controller: &RetryController,
    ) -> Result<(), WriterError> {
        self.validate_destination()?;
        self.bring_destination_up(controller).await
    }

    fn validate_destination(&self) -> Result<(), WriterError> {
        let name = self.destination.name();
        let mut problems = Vec::new();

        if name.trim().is_empty() {
            problems.push("destination name must not be empty".to_string());
        }
        if let Err(mut destination_problems) = self.destination.validate() {
            problems.append(&mut destination_problems);
        }

        let max_message_bytes = self.destination.max_message_bytes();
        if self.limits.max_count == 0 {
            problems.push("maximum batch count must be greater than 0".to_string());
        }
        if self.limits.max_bytes == 0 {
            problems.push("maximum batch size must be greater than 0".to_string());
        }
        let overhead = self.limits.message_overhead;
        if max_message_bytes == 0 {
            problems.push("maximum message size must be greater than 0".to_string());
        } else if max_message_bytes.saturating_add(overhead) > self.limits.max_bytes {
            problems.push(format!(
                "maximum message size ({max_message_bytes}) plus per-message overhead ({overhead}) exceeds maximum batch size ({})",
                self.limits.max_bytes
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(WriterError::InvalidDestination {
                name: name.to_string(),
                problems,
            })
        }
    }

    async fn bring_destination_up(&self, controller: &RetryController) -> Result<(), WriterError> {
        let name = self.destination.name();
        let destination = &self.destination;

        let status = controller
            .invoke(move || async move {
                match destination.status().await {
                    Ok(DestinationStatus::Unknown) => Attempt::throttled(),
                    Ok(status) => Attempt::Success(status),
                    Err(e) => e.into_attempt(),
                }
            })
            .await
            .map_err(|source| self.destination_error(source))?
            .ok_or_else(|| WriterError::DestinationNotReady {
                name: name.to_string(),
            })?;

        debug!(%status, "Destination status");

        match status {
            DestinationStatus::Active => Ok(()),
            DestinationStatus::DoesNotExist if !self.config.auto_create => {
                Err(WriterError::DestinationMissing {
                    name: name.to_string(),
                })
            }
            DestinationStatus::DoesNotExist => {
                info!("Destination does not exist, creating it");
                self.create_destination(controller).await?;
                self.wait_until_active(controller).await
            }
            DestinationStatus::Transitional | DestinationStatus::Unknown => {
                info!("Destination is transitioning, waiting for it to become active");
                self.wait_until_active(controller).await
            }
        }
    }

    async fn create_destination(&self, controller: &RetryController) -> Result<(), WriterError> {
        let destination = &self.destination;

        controller
            .invoke(move || async move {
                match destination.create().await {
                    Ok(()) => Attempt::Success(()),
                    Err(e) => e.into_attempt(),
                }
            })
            .await
            .map_err(|source| self.destination_error(source))?
            .ok_or_else(|| self.not_ready())?;

        controller
            .invoke(move || async move {
                match destination.configure_limits().await {
                    Ok(()) => Attempt::Success(()),
                    Err(e) => e.into_attempt(),
                }
            })
            .await
            .map_err(|source| self.destination_error(source))?
            .ok_or_else(|| self.not_ready())
    }

    async fn wait_until_active(&self, controller: &RetryController) -> Result<(), WriterError> {
        let destination = &self.destination;

        controller
            .invoke(move || async move {
                match destination.status().await {
                    Ok(DestinationStatus::Active) => Attempt::Success(()),
                    Ok(DestinationStatus::Unknown) => Attempt::throttled(),
                    // A freshly created destination may not be visible yet
                    Ok(DestinationStatus::DoesNotExist | DestinationStatus::Transitional) => {
                        Attempt::pending()
                    }
                    Err(e) => e.into_attempt(),
                }
            })
            .await
            .map_err(|source| self.destination_error(source))?
            .ok_or_else(|| self.not_ready())
    }

    fn destination_error(&self, source: anyhow::Error) -> WriterError {
        WriterError::Destination {
            name: self.destination.name().to_string(),
            source,
        }
    }

    fn not_ready(&self) -> WriterError {
        WriterError::DestinationNotReady {
            name: self.destination.name().to_string(),
        }
    }

    /// Terminal failure: record the error, disable the queue, release the destination.
    async fn fail(&self, error: WriterError) {
        error!(error = %error, "Log writer failed to initialize");

        let message = error.to_string();
        let error = anyhow::Error::new(error);
        self.shared.stats.record_error(message, Some(&error));
        self.shared.queue.disable();
        self.destination.shutdown().await;
        self.shared.set_state(WriterState::Failed);
    }

    async fn finish_stopped(&self) {
        self.destination.shutdown().await;
        self.shared.set_state(WriterState::Stopped);
    }

    // =========================================================================
    // Main loop
    // =========================================================================

    async fn process_loop(&self) {
        let cancel = &self.shared.cancel;

        loop {
            self.shared.set_state(WriterState::Waiting);

            let first = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                message = self.shared.queue.dequeue_timeout(self.config.batch_delay) => message,
            };

            let Some(first) = first else {
                continue;
            };
            let Some(batch) = self.build_batch(first) else {
                continue;
            };

            self.shared.set_state(WriterState::Sending);
            if !self.send(batch).await {
                self.pause_after_error().await;
            }
        }
    }

    /// Builds a batch starting with `first`, skipping messages that can never be sent.
    fn build_batch(&self, first: Message) -> Option<Batch> {
        let mut first = first;
        while !self.is_sendable(&first) {
            self.discard_oversize(&first);
            first = self.shared.queue.try_dequeue()?;
        }

        let remaining = self.limits.remaining_after(&first);
        let mut messages = Vec::with_capacity(self.limits.max_count.min(1024));
        messages.push(first);
        messages.extend(self.shared.queue.drain_available(remaining));

        Some(Batch::new(messages, &self.limits))
    }

    fn is_sendable(&self, message: &Message) -> bool {
        !message.is_oversize(self.destination.max_message_bytes()) && self.limits.fits_alone(message)
    }

    fn discard_oversize(&self, message: &Message) {
        self.shared.stats.record_oversize();
        warn!(
            size = message.byte_len(),
            max_message_bytes = self.destination.max_message_bytes(),
            max_batch_bytes = self.limits.max_bytes,
            "Discarding message that exceeds destination limits"
        );
    }

    /// Sends one batch under the send retry policy.
    ///
    /// Returns `false` only for a fatal failure, after the batch was requeued.
    async fn send(&self, batch: Batch) -> bool {
        let count = batch.len() as u64;
        if self.config.enable_batch_logging {
            debug!(
                batch_id = batch.id(),
                count,
                bytes = batch.total_bytes(),
                "Sending batch"
            );
        }

        let controller = RetryController::new(self.config.send_retry.clone())
            .with_cancellation(self.shared.cancel.clone());
        let destination = &self.destination;
        let messages = batch.messages();

        let result = controller
            .invoke(move || async move {
                match destination.send_batch(messages).await {
                    Ok(failed) => Attempt::Success(failed),
                    Err(e) => e.into_attempt(),
                }
            })
            .await;

        self.shared
            .stats
            .record_throttles(controller.throttled_attempts());

        let stats = &self.shared.stats;
        match result {
            Ok(Some(failed)) if failed.is_empty() => {
                stats.record_sent(count);
                stats.record_last_batch(count, 0);
                if self.config.enable_batch_logging {
                    debug!(batch_id = batch.id(), count, "Batch sent");
                }
                true
            }
            Ok(Some(failed)) => {
                let requeued = (failed.len() as u64).min(count);
                let sent = count - requeued;
                if sent > 0 {
                    stats.record_sent(sent);
                }
                stats.record_last_batch(sent, requeued);
                warn!(
                    batch_id = batch.id(),
                    sent, requeued, "Destination rejected part of the batch, requeueing"
                );
                self.shared.queue.requeue(failed);
                true
            }
            Ok(None) => {
                stats.record_last_batch(0, count);
                warn!(
                    batch_id = batch.id(),
                    count, "Batch not accepted before the retry timeout, requeueing"
                );
                self.shared.queue.requeue(batch.into_messages());
                true
            }
            Err(e) => {
                let message = format!(
                    "Failed to send batch to '{}': {e}",
                    self.destination.name()
                );
                let detail = format!("{e:#}");
                error!(batch_id = batch.id(), count, error = %detail, "Failed to send batch");
                stats.record_error(message, Some(&e));
                stats.record_last_batch(0, count);
                self.shared.queue.requeue(batch.into_messages());
                false
            }
        }
    }

    /// Waits `batch_delay` before the next attempt, unless the writer is stopping.
    async fn pause_after_error(&self) {
        tokio::select! {
            () = self.shared.cancel.cancelled() => {}
            () = tokio::time::sleep(self.config.batch_delay) => {}
        }
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    async fn stop_and_flush(&self) {
        self.shared.set_state(WriterState::Stopping);
        info!(queued = self.shared.queue.len(), "Log writer stopping, flushing queue");

        let deadline = Instant::now() + self.config.batch_delay;
        while Instant::now() < deadline {
            let Some(first) = self.shared.queue.try_dequeue() else {
                break;
            };
            let Some(batch) = self.build_batch(first) else {
                break;
            };

            if !self.send(batch).await {
                break;
            }
            // Give up on the flush once the destination pushes messages back
            let requeued = self.shared.stats.last_batch().requeued;
            if requeued > 0 {
                debug!(requeued, "Messages requeued during flush");
                break;
            }
        }

        self.destination.shutdown().await;
        self.shared.set_state(WriterState::Stopped);
        info!(
            remaining = self.shared.queue.len(),
            sent = self.shared.stats.messages_sent(),
            "Log writer stopped"
        );
    }
}

impl<D: Destination> std::fmt::Debug for LogWriter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("destination", &self.destination.name())
            .field("limits", &self.limits)
            .field("state", &self.shared.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::DestinationFuture;
    use std::time::Duration;

    /// Active destination with a 16-byte message limit that records deliveries.
    struct RecordingDestination {
        delivered: Arc<Mutex<Vec<Message>>>,
    }

    impl Destination for RecordingDestination {
        fn name(&self) -> &str {
            "app-logs"
        }

        fn batch_limits(&self) -> BatchLimits {
            BatchLimits::new(100, 1000).with_overhead(26)
        }

        fn max_message_bytes(&self) -> usize {
            16
        }

        fn status(&self) -> DestinationFuture<'_, DestinationStatus> {
            Box::pin(async { Ok(DestinationStatus::Active) })
        }

        fn create(&self) -> DestinationFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }

        fn send_batch<'a>(&'a self, messages: &'a [Message]) -> DestinationFuture<'a, Vec<Message>> {
            Box::pin(async move {
                self.delivered.lock().extend_from_slice(messages);
                Ok(Vec::new())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_drops_messages_that_can_never_fit() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let config = WriterConfig {
            batch_delay: Duration::from_millis(50),
            ..WriterConfig::default()
        };
        let destination = RecordingDestination {
            delivered: delivered.clone(),
        };
        let writer = LogWriter::new(config, destination).unwrap();

        // Straight into the queue, skipping the producer-side size check
        writer.shared.queue.enqueue(Message::new(1, "x".repeat(64)));
        writer.shared.queue.enqueue(Message::new(2, "fits"));
        let handle = writer.start();

        for _ in 0..200 {
            if handle.statistics().messages_sent == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let stats = handle.statistics();
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.messages_oversize, 1);
        let payloads: Vec<String> = delivered.lock().iter().map(|m| m.payload().to_string()).collect();
        assert_eq!(payloads, vec!["fits".to_string()]);

        handle.shutdown().await.unwrap();
    }
}
