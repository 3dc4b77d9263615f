//! API error type (inbox-gateway)

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the HTTP handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Channel not configured: {0}")]
    ChannelNotConfigured(&'static str),

    #[error(transparent)]
    Core(#[from] inbox_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;

/// Error body returned to clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ChannelNotConfigured(_) => StatusCode::NOT_FOUND,
            ApiError::Core(inbox_core::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(inbox_core::Error::BadRequest(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(inbox_core::Error::Send(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
