//! HTTP route handlers.

pub mod couriers;
pub mod health;
pub mod metrics;
pub mod orders;

use std::sync::Arc;

use application::{DeliveryQueries, DeliveryService};

/// Shared application state accessible from all handlers.
pub struct AppState<F, G> {
    pub service: Arc<DeliveryService<F, G>>,
    pub queries: DeliveryQueries<F>,
}
