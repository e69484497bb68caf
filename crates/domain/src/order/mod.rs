//! Order aggregate and related types.

mod aggregate;
mod events;
mod state;

pub use aggregate::Order;
pub use events::OrderCompletedEvent;
pub use state::{OrderStatus, UnknownOrderStatus};
