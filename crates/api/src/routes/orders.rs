//! Order endpoints.

use std::sync::Arc;

use application::{CreateOrder, GeoResolver, OrderView};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::OrderId;
use persistence::UnitOfWorkFactory;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Client-chosen id; repeating it makes the request idempotent.
    pub order_id: Option<String>,
    pub street: String,
    pub volume: i32,
}

#[derive(Debug, Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
}

/// POST /orders
#[tracing::instrument(skip(state))]
pub async fn create<F: UnitOfWorkFactory, G: GeoResolver + 'static>(
    State(state): State<Arc<AppState<F, G>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let order_id = match req.order_id.as_deref() {
        Some(raw) => uuid::Uuid::parse_str(raw)
            .map(OrderId::from_uuid)
            .map_err(|e| ApiError::BadRequest(format!("Invalid order_id: {e}")))?,
        None => OrderId::new(),
    };

    let cmd = CreateOrder::new(order_id, req.street, req.volume)?;
    let order_id = state.service.create_order(cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            order_id: order_id.to_string(),
        }),
    ))
}

/// GET /orders — orders not yet delivered.
pub async fn list<F: UnitOfWorkFactory, G: GeoResolver + 'static>(
    State(state): State<Arc<AppState<F, G>>>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    Ok(Json(state.queries.get_not_completed_orders().await?))
}
