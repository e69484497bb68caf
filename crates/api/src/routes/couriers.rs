//! Courier endpoints.

use std::sync::Arc;

use application::{CourierView, CreateCourier, GeoResolver};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use persistence::UnitOfWorkFactory;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateCourierRequest {
    pub name: String,
    pub speed: i32,
}

#[derive(Debug, Serialize)]
pub struct CourierCreatedResponse {
    pub courier_id: String,
}

/// POST /couriers
#[tracing::instrument(skip(state))]
pub async fn create<F: UnitOfWorkFactory, G: GeoResolver + 'static>(
    State(state): State<Arc<AppState<F, G>>>,
    Json(req): Json<CreateCourierRequest>,
) -> Result<(StatusCode, Json<CourierCreatedResponse>), ApiError> {
    let cmd = CreateCourier::new(req.name, req.speed)?;
    let courier_id = state.service.create_courier(cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(CourierCreatedResponse {
            courier_id: courier_id.to_string(),
        }),
    ))
}

/// GET /couriers
pub async fn list<F: UnitOfWorkFactory, G: GeoResolver + 'static>(
    State(state): State<Arc<AppState<F, G>>>,
) -> Result<Json<Vec<CourierView>>, ApiError> {
    Ok(Json(state.queries.get_all_couriers().await?))
}
