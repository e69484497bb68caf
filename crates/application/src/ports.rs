//! Ports to external collaborators.

use async_trait::async_trait;
use domain::Location;

use crate::error::{GeoError, PublishError};

/// Resolves a street name to a grid location.
#[async_trait]
pub trait GeoResolver: Send + Sync {
    async fn resolve(&self, street: &str) -> Result<Location, GeoError>;
}

/// Message bus client. Returns once the broker acknowledged the message.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes `payload` under `key`; messages with equal keys keep their
    /// relative order.
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}
