use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Envelope for successful responses
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub timestamp: DateTime<Utc>,
    /// Number of items, for list responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now(),
            total_count: None,
            status: StatusCode::OK,
        }
    }

    /// 201 response for a newly created resource
    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::success(data)
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.total_count = Some(count);
        self
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn list(items: Vec<T>) -> Self {
        let count = items.len();
        Self::success(items).with_count(count)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, "test data");
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.total_count.is_none());
    }

    #[test]
    fn test_created_response() {
        let response = ApiResponse::created(7);
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.into_response().status(), StatusCode::CREATED);
    }

    #[test]
    fn test_list_response_counts_items() {
        let response = ApiResponse::list(vec![1, 2, 3]);
        assert_eq!(response.total_count, Some(3));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["total_count"], 3);
        assert!(json.get("status").is_none());
    }
}
