//! inbox-instagram: Instagram Direct channel adapter
//!
//! Normalizes Meta Instagram Messaging webhooks and talks to the Instagram
//! Graph API for sends, history and profile lookups.

pub mod adapter;
pub mod client;
pub mod error;
pub mod payload;
pub mod signature;

pub use adapter::InstagramAdapter;
pub use client::{InstagramApi, OutgoingMessage};
pub use error::{InstagramError, Result};
pub use payload::{InstagramWebhook, THREAD_PREFIX};
pub use signature::{SIGNATURE_HEADER, sign_payload, verify_payload_signature};
