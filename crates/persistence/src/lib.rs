//! Persistence for the delivery aggregates.
//!
//! A [`UnitOfWork`] is the only way aggregates reach storage. It exposes the
//! order and courier repositories bound to its current transaction and, on
//! commit, writes the pending domain events of every aggregate it tracked as
//! outbox rows in that same transaction.

pub mod error;
pub mod memory;
pub mod ports;
pub mod postgres;
pub mod records;
pub mod tracker;

pub use error::{PersistenceError, Result};
pub use memory::{InMemoryDatabase, InMemoryUnitOfWork};
pub use ports::{CourierRepository, OrderRepository, UnitOfWork, UnitOfWorkFactory};
pub use postgres::{PostgresUnitOfWork, PostgresUnitOfWorkFactory};
pub use records::{CourierRecord, CourierRow, OrderRecord, StoragePlaceRecord};
pub use tracker::Tracker;
