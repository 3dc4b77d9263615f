//! inbox-whatsapp: WhatsApp channel adapter via Twilio
//!
//! Parses Twilio Conversations and Messaging webhooks into normalized inbox
//! events and sends messages through the Twilio REST API.

pub mod adapter;
pub mod client;
pub mod error;
pub mod payload;

pub use adapter::WhatsAppAdapter;
pub use client::{TwilioClient, compute_signature, verify_signature, whatsapp_address};
pub use error::{Result, WhatsAppError};
pub use payload::{ConversationsEvent, MessagingEvent, MessagingKind, TwilioWebhook};
