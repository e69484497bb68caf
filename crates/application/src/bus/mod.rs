//! Message bus adapters.

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

#[cfg(feature = "kafka")]
pub use kafka::KafkaEventBus;
pub use memory::{InMemoryEventBus, PublishedMessage};
