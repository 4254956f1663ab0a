use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{found, AppState};
use crate::api::{
    error::ApiError,
    extract::{Json, Path, Query},
    response::ApiResponse,
};
use crate::database::models::{GrillingSession, NewGrillingSession, SessionFilter, SessionUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(start_session))
        .route(
            "/sessions/:id",
            get(get_session).patch(update_session).delete(delete_session),
        )
        .route("/sessions/:id/finish", post(finish_session))
}

#[derive(Debug, Default, Deserialize)]
pub struct FinishRequest {
    ended_at: Option<DateTime<Utc>>,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
) -> Result<ApiResponse<Vec<GrillingSession>>, ApiError> {
    let sessions = state.managers.sessions().list(filter).await?;
    Ok(ApiResponse::list(sessions))
}

pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<NewGrillingSession>,
) -> Result<ApiResponse<GrillingSession>, ApiError> {
    let session = state.managers.sessions().create(request).await?;
    Ok(ApiResponse::created(session))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<GrillingSession>, ApiError> {
    let session = found("GrillingSession", id, state.managers.sessions().get(id).await?)?;
    Ok(ApiResponse::success(session))
}

pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SessionUpdate>,
) -> Result<ApiResponse<GrillingSession>, ApiError> {
    let session = state.managers.sessions().update(id, request).await?;
    Ok(ApiResponse::success(session))
}

/// POST /api/v1/sessions/:id/finish - body is optional
pub async fn finish_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request: Option<Json<FinishRequest>>,
) -> Result<ApiResponse<GrillingSession>, ApiError> {
    let ended_at = request.and_then(|Json(r)| r.ended_at);
    let session = state.managers.sessions().finish(id, ended_at).await?;
    Ok(ApiResponse::success(session))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.managers.sessions().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
