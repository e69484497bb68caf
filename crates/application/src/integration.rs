//! Integration events published to other bounded contexts.
//!
//! Domain events stay internal; only the records defined here cross the
//! bus. The wire record is JSON `{ "order_id": "<uuid>", "order_status": <code> }`.

use std::str::FromStr;

use domain::{DeliveryEvent, OrderCompletedEvent, OrderStatus};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, PublishError, Result};
use crate::ports::EventBus;

/// Closed set of order status codes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum OrderStatusCode {
    Unspecified = 0,
    Created = 1,
    Assigned = 2,
    Completed = 3,
}

impl From<OrderStatusCode> for i32 {
    fn from(code: OrderStatusCode) -> Self {
        code as i32
    }
}

impl TryFrom<i32> for OrderStatusCode {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(OrderStatusCode::Unspecified),
            1 => Ok(OrderStatusCode::Created),
            2 => Ok(OrderStatusCode::Assigned),
            3 => Ok(OrderStatusCode::Completed),
            other => Err(AppError::InvalidValue {
                field: "order_status",
                value: other.to_string(),
            }),
        }
    }
}

impl From<OrderStatus> for OrderStatusCode {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Created => OrderStatusCode::Created,
            OrderStatus::Assigned => OrderStatusCode::Assigned,
            OrderStatus::Completed => OrderStatusCode::Completed,
        }
    }
}

/// Tells other contexts that an order changed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedIntegrationEvent {
    pub order_id: String,
    pub order_status: OrderStatusCode,
}

impl OrderStatusChangedIntegrationEvent {
    /// Bus key; all messages of one order share it.
    pub fn key(&self) -> &str {
        &self.order_id
    }
}

impl TryFrom<&OrderCompletedEvent> for OrderStatusChangedIntegrationEvent {
    type Error = AppError;

    fn try_from(event: &OrderCompletedEvent) -> Result<Self> {
        let status =
            OrderStatus::from_str(&event.order_status).map_err(|e| AppError::InvalidValue {
                field: "order_status",
                value: e.0,
            })?;

        Ok(Self {
            order_id: event.order_id.to_string(),
            order_status: status.into(),
        })
    }
}

impl TryFrom<&DeliveryEvent> for OrderStatusChangedIntegrationEvent {
    type Error = AppError;

    fn try_from(event: &DeliveryEvent) -> Result<Self> {
        match event {
            DeliveryEvent::OrderCompleted(e) => Self::try_from(e),
        }
    }
}

/// Maps domain events to integration events and hands them to the bus.
#[derive(Debug, Clone)]
pub struct IntegrationPublisher<B> {
    bus: B,
}

impl<B: EventBus> IntegrationPublisher<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Publishes `event`, waiting for the bus acknowledgement or for
    /// `cancel` to fire, whichever comes first.
    pub async fn publish(&self, event: &DeliveryEvent, cancel: &CancellationToken) -> Result<()> {
        let integration = OrderStatusChangedIntegrationEvent::try_from(event)?;
        let payload = serde_json::to_vec(&integration)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PublishError::Cancelled.into()),
            result = self.bus.publish(integration.key(), payload) => result.map_err(AppError::from),
        }
    }
}
