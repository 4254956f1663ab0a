use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use super::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    database: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn healthy(latency_ms: u64) -> Self {
        Self {
            status: "healthy",
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            latency_ms: None,
            error: Some(error),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

async fn check_database(state: &AppState) -> ComponentHealth {
    match state.managers.database().health_check().await {
        Ok(latency) => ComponentHealth::healthy(latency.as_millis() as u64),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    }
}

/// GET /health - Health check endpoint
///
/// Reports storage connectivity; 503 when the database is unreachable
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let healthy = database.is_healthy();

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        timestamp: chrono::Utc::now(),
        checks: HealthChecks { database },
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(healthy, "Health check completed");
    (status_code, Json(response))
}

/// GET /health/ready - Readiness probe
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if check_database(&state).await.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_health_healthy() {
        let health = ComponentHealth::healthy(42);
        assert!(health.is_healthy());
        assert_eq!(health.latency_ms, Some(42));
        assert!(health.error.is_none());
    }

    #[test]
    fn test_component_health_unhealthy() {
        let health = ComponentHealth::unhealthy("Connection failed".to_string());
        assert!(!health.is_healthy());
        assert!(health.latency_ms.is_none());
        assert_eq!(health.error, Some("Connection failed".to_string()));
    }
}
