//! Error types for inbox-whatsapp

use thiserror::Error;

/// inbox-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("Twilio credentials not set")]
    CredentialsNotSet,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Twilio API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for WhatsAppError {
    fn from(err: reqwest::Error) -> Self {
        WhatsAppError::Http(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;
