//! Transactional outbox for delivery domain events.
//!
//! Aggregates raise events, the unit of work turns them into
//! [`OutboxMessage`] rows in its own transaction, and the relay reads them
//! back through [`OutboxStore`] and decodes them with an [`EventRegistry`].

pub mod error;
pub mod memory;
pub mod message;
pub mod postgres;
pub mod registry;
pub mod store;

pub use error::{OutboxError, Result};
pub use memory::InMemoryOutbox;
pub use message::OutboxMessage;
pub use postgres::PostgresOutbox;
pub use registry::EventRegistry;
pub use store::OutboxStore;
