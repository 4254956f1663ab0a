use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use super::{found, AppState};
use crate::api::{
    error::ApiError,
    extract::{Json, Path, Query},
    response::ApiResponse,
};
use crate::database::models::{Device, DeviceFilter, DeviceUpdate, NewDevice, TemperatureAlert};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices).post(add_device))
        .route(
            "/devices/:id",
            get(get_device).patch(update_device).delete(delete_device),
        )
        .route("/devices/:id/readings", post(submit_reading))
}

/// A probe reading pushed by a thermometer
#[derive(Debug, Deserialize)]
pub struct ReadingRequest {
    probe_id: Option<String>,
    temperature: f64,
}

/// GET /api/v1/devices - List devices, optionally by owner
pub async fn list_devices(
    State(state): State<AppState>,
    Query(filter): Query<DeviceFilter>,
) -> Result<ApiResponse<Vec<Device>>, ApiError> {
    let devices = state.managers.devices().list(filter).await?;
    Ok(ApiResponse::list(devices))
}

/// POST /api/v1/devices - Register a device for an existing user
pub async fn add_device(
    State(state): State<AppState>,
    Json(request): Json<NewDevice>,
) -> Result<ApiResponse<Device>, ApiError> {
    let device = state.managers.devices().create(request).await?;
    Ok(ApiResponse::created(device))
}

/// GET /api/v1/devices/:id
pub async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<Device>, ApiError> {
    let device = found("Device", id, state.managers.devices().get(id).await?)?;
    Ok(ApiResponse::success(device))
}

/// PATCH /api/v1/devices/:id
pub async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<DeviceUpdate>,
) -> Result<ApiResponse<Device>, ApiError> {
    let device = state.managers.devices().update(id, request).await?;
    Ok(ApiResponse::success(device))
}

/// DELETE /api/v1/devices/:id
pub async fn delete_device(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.managers.devices().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/devices/:id/readings - Returns the alerts the reading triggers
pub async fn submit_reading(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ReadingRequest>,
) -> Result<ApiResponse<Vec<TemperatureAlert>>, ApiError> {
    found("Device", id, state.managers.devices().get(id).await?)?;
    let triggered = state
        .managers
        .alerts()
        .evaluate(id, request.probe_id.as_deref(), request.temperature)
        .await?;
    Ok(ApiResponse::list(triggered))
}
