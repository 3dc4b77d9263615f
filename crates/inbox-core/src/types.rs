//! Inbox domain types
//!
//! Conversations and messages as persisted by the repositories, plus the
//! small enums shared by every channel.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Maximum length of `last_message_preview` and `reply_to_preview`
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Preview used when a message carries no text
pub const MEDIA_PLACEHOLDER: &str = "[Media]";

/// External messaging channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    WhatsApp,
    Instagram,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::WhatsApp => "whatsapp",
            Channel::Instagram => "instagram",
        }
    }
}

/// Generates `as_str`, `Display` and `FromStr` for the string-backed enums
/// stored in SQLite.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::Storage(format!(
                        "unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "whatsapp" => Ok(Channel::WhatsApp),
            "instagram" => Ok(Channel::Instagram),
            other => Err(Error::Config(format!("unknown channel: {}", other))),
        }
    }
}

/// Which side authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

string_enum!(Direction {
    Inbound => "inbound",
    Outbound => "outbound",
});

/// Kind of message content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
    File,
    Template,
}

string_enum!(ContentType {
    Text => "text",
    Image => "image",
    Video => "video",
    File => "file",
    Template => "template",
});

impl ContentType {
    /// Map a MIME type to a content type by its prefix
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            ContentType::Image
        } else if mime.starts_with("video/") {
            ContentType::Video
        } else {
            ContentType::File
        }
    }

    /// Whether the content is an attachment rather than text
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            ContentType::Image | ContentType::Video | ContentType::File
        )
    }
}

/// Delivery status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

string_enum!(MessageStatus {
    Sent => "sent",
    Delivered => "delivered",
    Read => "read",
    Failed => "failed",
});

/// Inbox state of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Open,
    Closed,
    Snoozed,
}

string_enum!(ConversationStatus {
    Open => "open",
    Closed => "closed",
    Snoozed => "snoozed",
});

/// Multi-tenant linkage of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub clinic_id: String,
    pub region_id: Option<String>,
    pub channel_config_id: Option<String>,
}

/// WhatsApp-specific message details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WhatsAppMessageMeta {
    pub account_sid: Option<String>,
    pub profile_name: Option<String>,
    pub wa_id: Option<String>,
    pub num_media: u32,
    pub media_content_type: Option<String>,
    pub conversation_sid: Option<String>,
    pub participant_sid: Option<String>,
    pub author: Option<String>,
    pub source: Option<String>,
    pub button_payload: Option<String>,
    pub button_text: Option<String>,
}

/// Instagram-specific message details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InstagramMessageMeta {
    pub entry_id: Option<String>,
    pub quick_reply_payload: Option<String>,
    pub reply_to_story_url: Option<String>,
    pub attachment_type: Option<String>,
    pub attachment_count: usize,
}

/// Template details of an operator-sent template message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TemplateMeta {
    pub template_id: String,
    pub variables: BTreeMap<String, String>,
}

/// Channel-specific details attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageMetadata {
    WhatsApp(WhatsAppMessageMeta),
    Instagram(InstagramMessageMeta),
    Template(TemplateMeta),
    #[default]
    None,
}

/// Provider error attached to a failed delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryError {
    pub code: Option<String>,
    pub message: Option<String>,
}

/// A persisted conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub channel: Channel,
    pub channel_conversation_id: String,
    pub contact_identifier: String,
    pub contact_name: Option<String>,
    pub status: ConversationStatus,
    pub tags: Vec<String>,
    pub assigned_user_id: Option<String>,
    pub unread_count: u32,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_preview: Option<String>,
    pub last_inbound_at: Option<DateTime<Utc>>,
    pub clinic_id: Option<String>,
    pub region_id: Option<String>,
    pub channel_config_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether the conversation is linked to a tenant
    pub fn has_tenant(&self) -> bool {
        self.clinic_id.is_some()
    }

    /// Whether the contact still lacks a human-readable name
    pub fn needs_display_name(&self) -> bool {
        match self.contact_name.as_deref() {
            None => true,
            Some(name) => looks_like_raw_id(name),
        }
    }
}

/// Fields needed to create a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct NewConversation {
    pub channel: Channel,
    pub channel_conversation_id: String,
    pub contact_identifier: String,
    pub contact_name: Option<String>,
    pub tenant: Option<TenantContext>,
    pub last_inbound_at: Option<DateTime<Utc>>,
}

/// Partial conversation update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationUpdate {
    pub contact_name: Option<String>,
    pub status: Option<ConversationStatus>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_preview: Option<String>,
    pub last_inbound_at: Option<DateTime<Utc>>,
    pub tenant: Option<TenantContext>,
}

impl ConversationUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ConversationUpdate::default()
    }
}

/// A persisted message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub channel_message_id: String,
    pub direction: Direction,
    pub sender_name: Option<String>,
    pub sender_user_id: Option<String>,
    pub content_type: ContentType,
    pub content_text: Option<String>,
    pub content_media_url: Option<String>,
    pub reply_to_message_id: Option<String>,
    pub reply_to_preview: Option<String>,
    pub status: MessageStatus,
    pub metadata: MessageMetadata,
    pub error: Option<DeliveryError>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a message
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub conversation_id: String,
    pub channel_message_id: String,
    pub direction: Direction,
    pub sender_name: Option<String>,
    pub sender_user_id: Option<String>,
    pub content_type: ContentType,
    pub content_text: Option<String>,
    pub content_media_url: Option<String>,
    pub reply_to_message_id: Option<String>,
    pub reply_to_preview: Option<String>,
    pub status: MessageStatus,
    pub metadata: MessageMetadata,
    pub created_at: DateTime<Utc>,
}

/// Display name and avatar cached per contact and channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactChannelProfile {
    pub id: String,
    pub channel: Channel,
    pub contact_identifier: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Truncate text to at most [`PREVIEW_MAX_CHARS`] characters
pub fn truncate_preview(text: &str) -> String {
    text.chars().take(PREVIEW_MAX_CHARS).collect()
}

/// Conversation preview for a message: its text, or the media placeholder
pub fn message_preview(text: Option<&str>) -> String {
    match text {
        Some(t) if !t.is_empty() => truncate_preview(t),
        _ => MEDIA_PLACEHOLDER.to_string(),
    }
}

/// Numeric-only names are raw channel ids (e.g. an IGSID), not display names
pub fn looks_like_raw_id(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name.chars().all(|c| c.is_ascii_digit())
}
