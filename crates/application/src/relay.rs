//! Outbox relay: forwards committed domain events to the message bus.

use chrono::Utc;
use outbox::{EventRegistry, OutboxMessage, OutboxStore};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, PublishError, Result};
use crate::integration::IntegrationPublisher;
use crate::ports::EventBus;

/// Default number of messages handled per run.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Outcome of a single relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub fetched: usize,
    pub published: usize,
    pub decode_failures: usize,
    pub publish_failures: usize,
    /// Published but not marked; they will be published again.
    pub mark_failures: usize,
    pub cancelled: bool,
}

enum Outcome {
    Published,
    DecodeFailed,
    PublishFailed,
    MarkFailed,
    Cancelled,
}

/// Reads unprocessed outbox messages oldest first, publishes them, and marks
/// each one processed after the bus acknowledged it.
///
/// Delivery is at least once: a crash between publish and mark republishes
/// the message on the next run.
pub struct OutboxRelay<O, B> {
    store: O,
    registry: EventRegistry,
    publisher: IntegrationPublisher<B>,
    batch_size: usize,
}

impl<O: OutboxStore, B: EventBus> OutboxRelay<O, B> {
    pub fn new(store: O, bus: B) -> Self {
        Self {
            store,
            registry: EventRegistry::default(),
            publisher: IntegrationPublisher::new(bus),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Processes one batch. Per-message failures are logged and counted;
    /// only a failure to read the outbox fails the run.
    #[tracing::instrument(skip(self, cancel), fields(batch_size = self.batch_size))]
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<RelayReport> {
        let messages = self.store.fetch_unprocessed(self.batch_size).await?;
        let mut report = RelayReport {
            fetched: messages.len(),
            ..RelayReport::default()
        };

        for message in &messages {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.relay(message, cancel).await {
                Outcome::Published => report.published += 1,
                Outcome::DecodeFailed => report.decode_failures += 1,
                Outcome::PublishFailed => report.publish_failures += 1,
                Outcome::MarkFailed => report.mark_failures += 1,
                Outcome::Cancelled => {
                    report.cancelled = true;
                    break;
                }
            }
        }

        if report.fetched > 0 {
            tracing::debug!(?report, "outbox batch relayed");
        }
        Ok(report)
    }

    async fn relay(&self, message: &OutboxMessage, cancel: &CancellationToken) -> Outcome {
        let event = match self.registry.decode(message) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    message_id = %message.id,
                    event_type = %message.name,
                    error = %e,
                    "cannot decode outbox message, leaving it unprocessed"
                );
                metrics::counter!("outbox_decode_failures_total").increment(1);
                return Outcome::DecodeFailed;
            }
        };

        match self.publisher.publish(&event, cancel).await {
            Ok(()) => {}
            Err(AppError::Publish(PublishError::Cancelled)) => {
                tracing::debug!(message_id = %message.id, "publish cancelled");
                return Outcome::Cancelled;
            }
            Err(AppError::Publish(e)) => {
                tracing::warn!(
                    message_id = %message.id,
                    event_type = %message.name,
                    error = %e,
                    "publish failed, message stays unprocessed"
                );
                metrics::counter!("outbox_publish_failures_total").increment(1);
                return Outcome::PublishFailed;
            }
            Err(e) => {
                tracing::warn!(
                    message_id = %message.id,
                    event_type = %message.name,
                    error = %e,
                    "cannot map outbox message to an integration event"
                );
                metrics::counter!("outbox_decode_failures_total").increment(1);
                return Outcome::DecodeFailed;
            }
        }

        match self.store.mark_processed(message.id, Utc::now()).await {
            Ok(marked) => {
                if !marked {
                    tracing::debug!(message_id = %message.id, "message already marked processed");
                }
                metrics::counter!("outbox_messages_published_total").increment(1);
                Outcome::Published
            }
            Err(e) => {
                tracing::error!(
                    message_id = %message.id,
                    error = %e,
                    "published message could not be marked processed"
                );
                Outcome::MarkFailed
            }
        }
    }
}
