//! Aggregate root capability and the embedded event buffer.

use uuid::Uuid;

use crate::events::DeliveryEvent;

/// Buffer of domain events raised by an aggregate but not yet persisted.
///
/// Every aggregate embeds one. Events are appended by aggregate methods,
/// read by the unit of work at commit, and cleared only after the commit
/// succeeded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBuffer {
    pending: Vec<DeliveryEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn raise(&mut self, event: impl Into<DeliveryEvent>) {
        self.pending.push(event.into());
    }

    /// Events raised since the last clear, in raise order.
    pub fn events(&self) -> &[DeliveryEvent] {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// An aggregate whose pending domain events can be drained by a unit of work.
///
/// Repositories and the unit of work depend on this trait only, never on a
/// concrete aggregate type.
pub trait AggregateRoot: Send + Sync + std::fmt::Debug {
    /// Stable type name, used in logs.
    fn aggregate_type(&self) -> &'static str;

    fn aggregate_id(&self) -> Uuid;

    /// Events raised since the last successful commit.
    fn domain_events(&self) -> &[DeliveryEvent];

    fn clear_domain_events(&mut self);
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::{EventId, OrderId};

    use super::*;
    use crate::order::OrderCompletedEvent;

    fn completed() -> OrderCompletedEvent {
        OrderCompletedEvent {
            event_id: EventId::new(),
            order_id: OrderId::new(),
            order_status: "Completed".to_string(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_buffer_keeps_raise_order() {
        let first = completed();
        let second = completed();
        let mut buffer = EventBuffer::new();
        buffer.raise(first.clone());
        buffer.raise(second.clone());

        assert_eq!(buffer.events().len(), 2);
        assert_eq!(buffer.events()[0].event_id(), first.event_id);
        assert_eq!(buffer.events()[1].event_id(), second.event_id);
    }

    #[test]
    fn test_clear_empties_buffer() {
        let mut buffer = EventBuffer::new();
        buffer.raise(completed());
        assert!(!buffer.is_empty());
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
