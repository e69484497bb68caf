use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::PublishError;
use crate::ports::EventBus;

/// A message accepted by [`InMemoryEventBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub key: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// Parses the payload as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
    }
}

/// In-memory bus that records every accepted message.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventBus {
    published: Arc<RwLock<Vec<PublishedMessage>>>,
    fail_on_publish: Arc<AtomicBool>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the bus to reject every publish.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.read().await.clone()
    }

    pub async fn published_count(&self) -> usize {
        self.published.read().await.len()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(PublishError::Bus("broker unreachable".to_string()));
        }

        self.published.write().await.push(PublishedMessage {
            key: key.to_string(),
            payload,
        });
        Ok(())
    }
}
