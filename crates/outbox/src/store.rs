use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::EventId;

use crate::{OutboxMessage, Result};

/// Read side of the outbox used by the relay.
///
/// Writes happen inside a unit of work, never through this trait.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Returns up to `limit` unprocessed messages, oldest `occurred_at_utc`
    /// first.
    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<OutboxMessage>>;

    /// Sets `processed_at_utc` if it is still unset.
    ///
    /// Returns false when the message is missing or already processed.
    async fn mark_processed(&self, id: EventId, processed_at: DateTime<Utc>) -> Result<bool>;

    async fn get(&self, id: EventId) -> Result<Option<OutboxMessage>>;
}
