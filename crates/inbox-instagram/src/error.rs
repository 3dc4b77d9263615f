//! Error types for inbox-instagram

use thiserror::Error;

/// inbox-instagram error type
#[derive(Error, Debug)]
pub enum InstagramError {
    #[error("Instagram access token not set")]
    AccessTokenNotSet,

    #[error("Instagram Graph API error: {status} - {body}")]
    GraphApi { status: u16, body: String },

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, InstagramError>;
