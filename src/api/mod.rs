//! Axum HTTP API: session routes over the story engine.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::AppError;

pub mod handlers;
pub mod routes;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::SessionNotFound(_) | AppError::InvalidIndex { .. } => StatusCode::NOT_FOUND,
            AppError::MissingApiKey => StatusCode::UNAUTHORIZED,
            AppError::Config(_) => StatusCode::BAD_REQUEST,
            e if e.is_precondition() => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::HttpClient(_) | AppError::Api { .. } | AppError::UnexpectedResponse(_) => StatusCode::BAD_GATEWAY,
            AppError::PollTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}
