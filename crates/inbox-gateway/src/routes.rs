//! Route definitions

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{
    health, instagram_verify, instagram_webhook, list_messages, mark_read, resend_message,
    send_message, whatsapp_webhook,
};
use crate::server::AppState;

/// Create the router
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Provider webhooks
        .route("/webhooks/whatsapp", post(whatsapp_webhook))
        .route(
            "/webhooks/instagram",
            get(instagram_verify).post(instagram_webhook),
        )
        // Inbox API
        .route(
            "/api/conversations/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/conversations/{id}/read", post(mark_read))
        .route("/api/messages/{id}/resend", post(resend_message))
}
