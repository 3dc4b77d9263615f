//! Meta Instagram Messaging webhook payloads

use chrono::{DateTime, Utc};
use inbox_core::event::{EventKind, NormalizedMessage, NormalizedWebhookEvent, Reaction, StatusUpdate};
use inbox_core::types::{
    Channel, ContentType, Direction, InstagramMessageMeta, MessageMetadata, MessageStatus,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use tracing::debug;

/// Thread keys are namespaced so they never collide with other channels
pub const THREAD_PREFIX: &str = "instagram:";

#[derive(Debug, Clone, Deserialize)]
pub struct InstagramWebhook {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    pub sender: Participant,
    pub recipient: Participant,
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub message: Option<WebhookMessage>,
    pub delivery: Option<Delivery>,
    pub read: Option<Read>,
    pub reaction: Option<ReactionPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMessage {
    pub mid: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub quick_reply: Option<QuickReply>,
    pub reply_to: Option<ReplyTo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub attachment_type: String,
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentPayload {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuickReply {
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyTo {
    pub mid: Option<String>,
    pub story: Option<StoryReply>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoryReply {
    pub url: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Delivery {
    #[serde(default)]
    pub mids: Vec<String>,
    pub watermark: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Read {
    pub watermark: Option<i64>,
    pub mid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionPayload {
    pub mid: String,
    pub action: String,
    pub reaction: Option<String>,
    pub emoji: Option<String>,
}

impl InstagramWebhook {
    /// Normalize every messaging event of every entry, in payload order.
    ///
    /// `business_id` decides direction; when unset each entry's id stands in.
    pub fn normalize(&self, business_id: Option<&str>) -> Vec<NormalizedWebhookEvent> {
        if self.object != "instagram" {
            debug!("Ignoring webhook for object {}", self.object);
            return Vec::new();
        }

        self.entry
            .iter()
            .flat_map(|entry| {
                let business = business_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or(&entry.id);
                entry
                    .messaging
                    .iter()
                    .filter_map(move |event| event.normalize(entry, business))
            })
            .collect()
    }
}

impl MessagingEvent {
    fn normalize(&self, entry: &WebhookEntry, business: &str) -> Option<NormalizedWebhookEvent> {
        let outbound = self.sender.id == business;
        let contact = if outbound {
            &self.recipient.id
        } else {
            &self.sender.id
        };

        let kind = if let Some(message) = &self.message {
            if message.is_echo || message.is_deleted {
                debug!("Skipping echo/deleted Instagram message");
                return None;
            }
            EventKind::Message(self.to_message(message, entry, outbound)?)
        } else if let Some(delivery) = &self.delivery {
            EventKind::StatusUpdate(StatusUpdate {
                message_id: delivery.mids.first().cloned().unwrap_or_default(),
                status: MessageStatus::Delivered,
                watermark: None,
                error: None,
            })
        } else if let Some(read) = &self.read {
            EventKind::StatusUpdate(StatusUpdate {
                message_id: String::new(),
                status: MessageStatus::Read,
                watermark: read.watermark,
                error: None,
            })
        } else if let Some(reaction) = &self.reaction {
            EventKind::Reaction(Reaction {
                target_message_id: reaction.mid.clone(),
                emoji: reaction
                    .emoji
                    .clone()
                    .or_else(|| reaction.reaction.clone())
                    .unwrap_or_default(),
                action: reaction.action.clone(),
            })
        } else {
            debug!("Ignoring Instagram messaging event without a known field");
            return None;
        };

        Some(NormalizedWebhookEvent {
            channel: Channel::Instagram,
            channel_conversation_id: format!("{}{}", THREAD_PREFIX, contact),
            contact_identifier: contact.clone(),
            contact_name: None,
            channel_account_id: Some(entry.id.clone()),
            kind,
        })
    }

    fn to_message(
        &self,
        message: &WebhookMessage,
        entry: &WebhookEntry,
        outbound: bool,
    ) -> Option<NormalizedMessage> {
        let mid = message.mid.clone().filter(|m| !m.is_empty())?;
        let first = message.attachments.first();
        let content_type = match first.map(|a| a.attachment_type.as_str()) {
            None => ContentType::Text,
            Some("image") => ContentType::Image,
            Some("video") => ContentType::Video,
            Some(_) => ContentType::File,
        };
        let reply_to = message.reply_to.as_ref();

        Some(NormalizedMessage {
            channel_message_id: mid,
            direction: if outbound {
                Direction::Outbound
            } else {
                Direction::Inbound
            },
            sender_name: None,
            content_type,
            content_text: message.text.clone().filter(|t| !t.is_empty()),
            content_media_url: first
                .and_then(|a| a.payload.as_ref())
                .and_then(|p| p.url.clone()),
            reply_to_external_id: reply_to.and_then(|r| r.mid.clone()),
            timestamp: self
                .timestamp
                .and_then(DateTime::from_timestamp_millis)
                .unwrap_or_else(Utc::now),
            metadata: MessageMetadata::Instagram(InstagramMessageMeta {
                entry_id: Some(entry.id.clone()),
                quick_reply_payload: message.quick_reply.as_ref().map(|q| q.payload.clone()),
                reply_to_story_url: reply_to
                    .and_then(|r| r.story.as_ref())
                    .and_then(|s| s.url.clone()),
                attachment_type: first.map(|a| a.attachment_type.clone()),
                attachment_count: message.attachments.len(),
            }),
        })
    }
}

/// Graph ids usually arrive as strings; tolerate numbers
fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {}", other))),
    }
}
