//! Delivery use cases and background processing.
//!
//! - [`DeliveryService`] executes commands, each inside its own unit of work
//! - [`DeliveryQueries`] answers read queries
//! - [`OutboxRelay`] forwards committed domain events to the message bus as
//!   integration events
//! - [`PeriodicWorker`] drives the assignment, movement and relay jobs

pub mod bus;
pub mod commands;
pub mod error;
pub mod geo;
pub mod integration;
pub mod jobs;
pub mod ports;
pub mod queries;
pub mod relay;
pub mod service;

pub use bus::{InMemoryEventBus, PublishedMessage};
#[cfg(feature = "kafka")]
pub use bus::KafkaEventBus;
pub use commands::{CreateCourier, CreateOrder};
pub use error::{AppError, ErrorKind, GeoError, PublishError, Result};
pub use geo::{InMemoryGeoResolver, RandomGeoResolver, TimeoutGeoResolver};
pub use integration::{IntegrationPublisher, OrderStatusChangedIntegrationEvent, OrderStatusCode};
pub use jobs::{AssignOrdersJob, Job, MoveCouriersJob, OutboxRelayJob, PeriodicWorker};
pub use ports::{EventBus, GeoResolver};
pub use queries::{CourierView, DeliveryQueries, LocationView, OrderView};
pub use relay::{DEFAULT_BATCH_SIZE, OutboxRelay, RelayReport};
pub use service::{Assignment, DeliveryService, MoveReport};
