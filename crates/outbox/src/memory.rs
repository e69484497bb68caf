use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::EventId;
use tokio::sync::RwLock;

use crate::{OutboxError, OutboxMessage, OutboxStore, Result};

/// In-memory outbox table for tests and the database-less binary.
///
/// Clones share the same rows.
#[derive(Clone, Default)]
pub struct InMemoryOutbox {
    messages: Arc<RwLock<Vec<OutboxMessage>>>,
    fail_on_mark: Arc<AtomicBool>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends rows. Called by the in-memory unit of work while it holds its
    /// commit lock. Nothing is stored if any id is already present.
    pub async fn append(&self, messages: impl IntoIterator<Item = OutboxMessage>) -> Result<()> {
        let mut stored = self.messages.write().await;
        let batch: Vec<OutboxMessage> = messages.into_iter().collect();
        for (i, message) in batch.iter().enumerate() {
            if stored.iter().chain(&batch[..i]).any(|m| m.id == message.id) {
                return Err(OutboxError::DuplicateMessage(message.id));
            }
        }
        stored.extend(batch);
        Ok(())
    }

    /// Returns true if a row with this id exists.
    pub async fn contains(&self, id: EventId) -> bool {
        self.messages.read().await.iter().any(|m| m.id == id)
    }

    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn unprocessed_count(&self) -> usize {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| !m.is_processed())
            .count()
    }

    /// Snapshot of every row in insertion order.
    pub async fn all(&self) -> Vec<OutboxMessage> {
        self.messages.read().await.clone()
    }

    /// Makes `mark_processed` fail until reset.
    pub fn set_fail_on_mark(&self, fail: bool) {
        self.fail_on_mark.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutbox {
    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let messages = self.messages.read().await;
        let mut pending: Vec<_> = messages
            .iter()
            .filter(|m| !m.is_processed())
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.occurred_at_utc);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_processed(&self, id: EventId, processed_at: DateTime<Utc>) -> Result<bool> {
        if self.fail_on_mark.load(Ordering::SeqCst) {
            return Err(OutboxError::Unavailable("mark_processed disabled"));
        }

        let mut messages = self.messages.write().await;
        match messages
            .iter_mut()
            .find(|m| m.id == id && !m.is_processed())
        {
            Some(message) => {
                message.processed_at_utc = Some(processed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, id: EventId) -> Result<Option<OutboxMessage>> {
        let messages = self.messages.read().await;
        Ok(messages.iter().find(|m| m.id == id).cloned())
    }
}
