//! Normalized webhook events
//!
//! Every channel adapter turns its provider payload into a
//! [`NormalizedWebhookEvent`]; the reconciliation engine only ever sees this
//! shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Channel, ContentType, DeliveryError, Direction, MessageMetadata, MessageStatus};

/// A provider event translated into the channel-agnostic model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWebhookEvent {
    pub channel: Channel,
    /// Thread key within the channel
    pub channel_conversation_id: String,
    /// Customer identity within the channel
    pub contact_identifier: String,
    pub contact_name: Option<String>,
    /// Business-side account or page that received the event
    pub channel_account_id: Option<String>,
    pub kind: EventKind,
}

/// Kind-specific payload of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Message(NormalizedMessage),
    StatusUpdate(StatusUpdate),
    ConversationCreated,
    Reaction(Reaction),
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Message(_) => "message",
            EventKind::StatusUpdate(_) => "status_update",
            EventKind::ConversationCreated => "conversation_created",
            EventKind::Reaction(_) => "reaction",
        }
    }
}

/// A message as delivered by a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub channel_message_id: String,
    pub direction: Direction,
    pub sender_name: Option<String>,
    pub content_type: ContentType,
    pub content_text: Option<String>,
    pub content_media_url: Option<String>,
    /// Channel message id this message replies to
    pub reply_to_external_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: MessageMetadata,
}

/// Delivery/read status change
///
/// With a `watermark` the status applies to every outbound message of the
/// conversation created at or before it, and `message_id` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub message_id: String,
    pub status: MessageStatus,
    pub watermark: Option<i64>,
    pub error: Option<DeliveryError>,
}

/// Reaction to an existing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub target_message_id: String,
    pub emoji: String,
    pub action: String,
}
