//! Domain layer for the delivery system.
//!
//! This crate provides:
//! - `Location`, the validated grid coordinate
//! - the `Courier` aggregate with its `StoragePlace`s
//! - the `Order` aggregate and its status machine
//! - domain events and the `EventBuffer` every aggregate embeds
//! - `DispatchService`, the nearest-courier assignment algorithm
//!
//! Nothing here performs I/O.

pub mod aggregate;
pub mod courier;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod kernel;
pub mod order;

pub use aggregate::{AggregateRoot, EventBuffer};
pub use courier::{Courier, StoragePlace};
pub use dispatch::DispatchService;
pub use error::{DomainError, ErrorKind};
pub use events::DeliveryEvent;
pub use kernel::Location;
pub use order::{Order, OrderCompletedEvent, OrderStatus, UnknownOrderStatus};
