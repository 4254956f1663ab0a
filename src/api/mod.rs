pub mod alerts;
pub mod devices;
pub mod error;
pub mod extract;
pub mod health;
pub mod response;
pub mod sessions;
pub mod users;

use axum::{extract::DefaultBodyLimit, http::StatusCode, routing::get, Router};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, database::Managers};
use error::ApiError;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub managers: Managers,
}

impl AppState {
    pub fn new(managers: Managers) -> Self {
        Self { managers }
    }
}

pub fn router(state: AppState, cfg: &Config) -> Router {
    let v1 = Router::new()
        .merge(users::router())
        .merge(devices::router())
        .merge(alerts::router())
        .merge(sessions::router());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .nest("/api/v1", v1)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(cfg.server.request_timeout_secs),
                )),
        )
        .layer(TraceLayer::new_for_http())
}

/// Turn a missing row into a 404
pub(crate) fn found<T>(entity: &str, id: i64, row: Option<T>) -> Result<T, ApiError> {
    row.ok_or_else(|| ApiError::NotFound(format!("{entity} {id} not found")))
}
