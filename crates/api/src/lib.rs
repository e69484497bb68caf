//! HTTP surface and process wiring for the delivery service.
//!
//! Exposes courier and order endpoints over the application layer, plus
//! health and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use application::{DeliveryQueries, DeliveryService, GeoResolver};
use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use persistence::UnitOfWorkFactory;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<F: UnitOfWorkFactory, G: GeoResolver + 'static>(
    state: Arc<AppState<F, G>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/couriers",
            get(routes::couriers::list::<F, G>).post(routes::couriers::create::<F, G>),
        )
        .route(
            "/orders",
            get(routes::orders::list::<F, G>).post(routes::orders::create::<F, G>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the handler state over one storage backend.
pub fn create_state<F, G>(uow: F, geo: G) -> Arc<AppState<F, G>>
where
    F: UnitOfWorkFactory + Clone,
    G: GeoResolver + 'static,
{
    Arc::new(AppState {
        service: Arc::new(DeliveryService::new(uow.clone(), geo)),
        queries: DeliveryQueries::new(uow),
    })
}
