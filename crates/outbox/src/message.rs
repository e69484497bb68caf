use chrono::{DateTime, Utc};
use common::EventId;
use domain::DeliveryEvent;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A domain event persisted for later publication.
///
/// Rows are written in the transaction that persists the aggregate which
/// raised the event. The relay only ever sets `processed_at_utc`; rows are
/// never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Same value as the event id.
    pub id: EventId,

    /// Stable event type tag.
    pub name: String,

    pub payload: serde_json::Value,

    pub occurred_at_utc: DateTime<Utc>,

    /// Set once the event was published.
    pub processed_at_utc: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// Encodes a domain event into an unprocessed message.
    pub fn from_event(event: &DeliveryEvent) -> Result<Self> {
        Ok(Self {
            id: event.event_id(),
            name: event.event_type().to_string(),
            payload: event.to_payload()?,
            occurred_at_utc: event.occurred_at(),
            processed_at_utc: None,
        })
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at_utc.is_some()
    }
}

#[cfg(test)]
mod tests {
    use common::OrderId;
    use domain::OrderCompletedEvent;

    use super::*;

    #[test]
    fn from_event_copies_identity_and_tag() {
        let event = DeliveryEvent::from(OrderCompletedEvent {
            event_id: EventId::new(),
            order_id: OrderId::new(),
            order_status: "Completed".to_string(),
            occurred_at: Utc::now(),
        });

        let message = OutboxMessage::from_event(&event).unwrap();

        assert_eq!(message.id, event.event_id());
        assert_eq!(message.name, "order.completed");
        assert_eq!(message.occurred_at_utc, event.occurred_at());
        assert!(!message.is_processed());
        assert_eq!(message.payload["order_status"], "Completed");
    }
}
