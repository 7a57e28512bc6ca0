//! HTTP mapping of the unified error taxonomy

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flux_core::FluxError;
use serde_json::json;
use tracing::error;

/// Error wrapper carrying the HTTP mapping of a [`FluxError`]
#[derive(Debug)]
pub struct ApiError(pub FluxError);

impl From<FluxError> for ApiError {
    fn from(e: FluxError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            FluxError::MalformedSpec(_) => (StatusCode::BAD_REQUEST, "malformed_spec"),
            FluxError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            FluxError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            FluxError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
            FluxError::RouterTimeout(_) => (StatusCode::SERVICE_UNAVAILABLE, "router_timeout"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = Json(json!({
            "code": code,
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}
