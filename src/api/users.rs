use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;

use super::{found, AppState};
use crate::api::{
    error::ApiError,
    extract::{Json, Path, Query},
    response::ApiResponse,
};
use crate::credentials;
use crate::database::models::{double_option, NewUser, User, UserFilter, UserUpdate};

const MIN_PASSWORD_LEN: usize = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

/// Request to register a user; the password is hashed before storage
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    email: String,
    password: String,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    email: Option<String>,
    password: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    display_name: Option<Option<String>>,
    is_active: Option<bool>,
}

async fn hash(password: String) -> Result<String, ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::ValidationError(format!(
            "password: must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    tokio::task::spawn_blocking(move || credentials::hash_password(&password))
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .map_err(|e| ApiError::InternalError(e.to_string()))
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<ApiResponse<Vec<User>>, ApiError> {
    let users = state.managers.users().list(filter).await?;
    Ok(ApiResponse::list(users))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<ApiResponse<User>, ApiError> {
    let new = NewUser {
        email: request.email,
        password_hash: hash(request.password).await?,
        display_name: request.display_name,
    };
    let user = state.managers.users().create(new).await?;
    Ok(ApiResponse::created(user))
}

/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<User>, ApiError> {
    let user = found("User", id, state.managers.users().get(id).await?)?;
    Ok(ApiResponse::success(user))
}

/// PATCH /api/v1/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<ApiResponse<User>, ApiError> {
    let password_hash = match request.password {
        Some(password) => Some(hash(password).await?),
        None => None,
    };
    let patch = UserUpdate {
        email: request.email,
        password_hash,
        display_name: request.display_name,
        is_active: request.is_active,
    };
    let user = state.managers.users().update(id, patch).await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /api/v1/users/:id - removes the user's devices, alerts and sessions too
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.managers.users().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
