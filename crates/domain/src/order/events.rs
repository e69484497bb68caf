//! Order domain events.

use chrono::{DateTime, Utc};
use common::{EventId, OrderId};
use serde::{Deserialize, Serialize};

/// Raised when an order reaches `Completed`.
///
/// The status is carried as its string name; the integration mapper
/// translates it to a wire code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub event_id: EventId,
    pub order_id: OrderId,
    pub order_status: String,
    pub occurred_at: DateTime<Utc>,
}

impl OrderCompletedEvent {
    /// Stable outbox tag for this event.
    pub const EVENT_TYPE: &'static str = "order.completed";
}
