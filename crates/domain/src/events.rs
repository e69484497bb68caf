//! Domain events raised by delivery aggregates.

use chrono::{DateTime, Utc};
use common::EventId;
use serde::Serialize;
use uuid::Uuid;

use crate::order::OrderCompletedEvent;

/// Every domain event the delivery aggregates can raise.
///
/// Each variant carries an explicit, stable type tag. Stored outbox rows are
/// keyed by that tag, so renaming a Rust type never changes what is
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryEvent {
    OrderCompleted(OrderCompletedEvent),
}

impl DeliveryEvent {
    /// Returns the stable tag stored alongside the payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            DeliveryEvent::OrderCompleted(_) => OrderCompletedEvent::EVENT_TYPE,
        }
    }

    pub fn event_id(&self) -> EventId {
        match self {
            DeliveryEvent::OrderCompleted(e) => e.event_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DeliveryEvent::OrderCompleted(e) => e.occurred_at,
        }
    }

    /// Id of the aggregate that raised the event.
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            DeliveryEvent::OrderCompleted(e) => e.order_id.as_uuid(),
        }
    }

    /// Serializes the variant's payload without the enum wrapper.
    pub fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            DeliveryEvent::OrderCompleted(e) => to_value(e),
        }
    }
}

fn to_value<T: Serialize>(payload: &T) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(payload)
}

impl From<OrderCompletedEvent> for DeliveryEvent {
    fn from(event: OrderCompletedEvent) -> Self {
        DeliveryEvent::OrderCompleted(event)
    }
}

#[cfg(test)]
mod tests {
    use common::OrderId;

    use super::*;

    #[test]
    fn test_payload_is_flat() {
        let order_id = OrderId::new();
        let event = DeliveryEvent::from(OrderCompletedEvent {
            event_id: EventId::new(),
            order_id,
            order_status: "Completed".to_string(),
            occurred_at: Utc::now(),
        });

        let payload = event.to_payload().unwrap();
        assert_eq!(payload["order_id"], order_id.to_string());
        assert_eq!(payload["order_status"], "Completed");
        assert_eq!(event.event_type(), "order.completed");
        assert_eq!(event.aggregate_id(), order_id.as_uuid());
    }
}
