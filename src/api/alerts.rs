use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};

use super::{found, AppState};
use crate::api::{
    error::ApiError,
    extract::{Json, Path, Query},
    response::ApiResponse,
};
use crate::database::models::{AlertFilter, AlertUpdate, NewTemperatureAlert, TemperatureAlert};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts).post(create_alert))
        .route(
            "/alerts/:id",
            get(get_alert).patch(update_alert).delete(delete_alert),
        )
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(filter): Query<AlertFilter>,
) -> Result<ApiResponse<Vec<TemperatureAlert>>, ApiError> {
    let alerts = state.managers.alerts().list(filter).await?;
    Ok(ApiResponse::list(alerts))
}

pub async fn create_alert(
    State(state): State<AppState>,
    Json(request): Json<NewTemperatureAlert>,
) -> Result<ApiResponse<TemperatureAlert>, ApiError> {
    let alert = state.managers.alerts().create(request).await?;
    Ok(ApiResponse::created(alert))
}

pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<TemperatureAlert>, ApiError> {
    let alert = found("TemperatureAlert", id, state.managers.alerts().get(id).await?)?;
    Ok(ApiResponse::success(alert))
}

pub async fn update_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<AlertUpdate>,
) -> Result<ApiResponse<TemperatureAlert>, ApiError> {
    let alert = state.managers.alerts().update(id, request).await?;
    Ok(ApiResponse::success(alert))
}

pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.managers.alerts().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
