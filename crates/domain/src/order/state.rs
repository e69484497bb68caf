//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Transitions only move forward:
/// ```text
/// Created ──► Assigned ──► Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order is waiting for a courier.
    #[default]
    Created,

    /// A courier carries the order.
    Assigned,

    /// The order was delivered (terminal state).
    Completed,
}

impl OrderStatus {
    /// Returns true if a courier can be assigned in this status.
    pub fn can_assign(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    /// Returns true if the order can be completed in this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Assigned)
    }

    /// Returns the status name as stored and published.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "Created",
            OrderStatus::Assigned => "Assigned",
            OrderStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string names no known status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(OrderStatus::Created),
            "Assigned" => Ok(OrderStatus::Assigned),
            "Completed" => Ok(OrderStatus::Completed),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }
}
