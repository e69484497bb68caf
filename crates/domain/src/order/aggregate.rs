//! Order aggregate implementation.

use chrono::Utc;
use common::{CourierId, EventId, OrderId};
use uuid::Uuid;

use crate::aggregate::{AggregateRoot, EventBuffer};
use crate::error::{DomainError, Result};
use crate::events::DeliveryEvent;
use crate::kernel::Location;

use super::{OrderCompletedEvent, OrderStatus};

/// Order aggregate root.
///
/// An order is placed at a grid location with a volume, is assigned to at
/// most one courier and is completed once that courier arrives. Equality is
/// by identity only.
#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    courier_id: Option<CourierId>,
    location: Location,
    volume: i32,
    status: OrderStatus,
    events: EventBuffer,
}

impl Order {
    /// Creates a new order in `Created` status.
    pub fn new(id: OrderId, location: Location, volume: i32) -> Result<Self> {
        if id.is_nil() {
            return Err(DomainError::ValueRequired("order id"));
        }
        if volume <= 0 {
            return Err(DomainError::ValueRequired("volume"));
        }

        Ok(Self {
            id,
            courier_id: None,
            location,
            volume,
            status: OrderStatus::Created,
            events: EventBuffer::new(),
        })
    }

    /// Rebuilds an order from persisted state without raising events.
    ///
    /// A courier id must be present exactly when the status is not `Created`.
    pub fn restore(
        id: OrderId,
        courier_id: Option<CourierId>,
        location: Location,
        volume: i32,
        status: OrderStatus,
    ) -> Result<Self> {
        let mut order = Self::new(id, location, volume)?;
        match (status, courier_id) {
            (OrderStatus::Created, None) => {}
            (OrderStatus::Created, Some(_)) => {
                return Err(DomainError::InvalidTransition {
                    current: status,
                    action: "hold a courier for",
                });
            }
            (_, None) => return Err(DomainError::ValueRequired("courier id")),
            (_, Some(courier_id)) => order.courier_id = Some(courier_id),
        }
        order.status = status;
        Ok(order)
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn courier_id(&self) -> Option<CourierId> {
        self.courier_id
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }
}

// Command methods
impl Order {
    /// Assigns the order to a courier.
    ///
    /// Requires `Created` status; on failure the order is left unchanged.
    pub fn assign_courier(&mut self, courier_id: CourierId) -> Result<()> {
        if courier_id.is_nil() {
            return Err(DomainError::ValueRequired("courier id"));
        }
        if !self.status.can_assign() {
            return Err(DomainError::InvalidTransition {
                current: self.status,
                action: "assign",
            });
        }

        self.courier_id = Some(courier_id);
        self.status = OrderStatus::Assigned;
        Ok(())
    }

    /// Marks the order as delivered and raises [`OrderCompletedEvent`].
    pub fn complete(&mut self) -> Result<()> {
        if !self.status.can_complete() {
            return Err(DomainError::InvalidTransition {
                current: self.status,
                action: "complete",
            });
        }

        self.status = OrderStatus::Completed;
        self.events.raise(OrderCompletedEvent {
            event_id: EventId::new(),
            order_id: self.id,
            order_status: self.status.as_str().to_string(),
            occurred_at: Utc::now(),
        });
        Ok(())
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Order {}

impl AggregateRoot for Order {
    fn aggregate_type(&self) -> &'static str {
        "Order"
    }

    fn aggregate_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn domain_events(&self) -> &[DeliveryEvent] {
        self.events.events()
    }

    fn clear_domain_events(&mut self) {
        self.events.clear();
    }
}
