//! Identifier types shared by every crate of the delivery system.

mod types;

pub use types::{CourierId, EventId, OrderId, StoragePlaceId};
