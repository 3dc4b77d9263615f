//! inbox-gateway: HTTP surface of the unified inbox
//!
//! Receives Twilio and Meta webhooks, feeds them to the reconciliation engine,
//! and exposes a small API for staff replies and conversation housekeeping.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod sink;

pub use error::{ApiError, Result};
pub use server::{AppState, app, start_server};
pub use sink::LoggingNotificationSink;
