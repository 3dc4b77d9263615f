//! Twilio webhook payloads
//!
//! One endpoint receives two unrelated body shapes: Conversations API events
//! (carry `EventType`) and Messaging API callbacks (carry `MessageSid`,
//! `SmsMessageSid` or `From`). Form fields arrive as a JSON object of strings.

use chrono::{DateTime, Utc};
use inbox_core::event::{EventKind, NormalizedMessage, NormalizedWebhookEvent, Reaction, StatusUpdate};
use inbox_core::types::{
    Channel, ContentType, DeliveryError, Direction, MessageMetadata, MessageStatus,
    WhatsAppMessageMeta,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{Result, WhatsAppError};

/// Address prefix Twilio puts on WhatsApp numbers
pub const WHATSAPP_PREFIX: &str = "whatsapp:";

/// A webhook body after shape detection
#[derive(Debug, Clone, PartialEq)]
pub enum TwilioWebhook {
    Conversations(ConversationsEvent),
    Messaging(MessagingEvent),
    Unrecognized,
}

impl TwilioWebhook {
    /// Detect the payload shape and deserialize it
    pub fn from_value(raw: &JsonValue) -> Result<Self> {
        let Some(object) = raw.as_object() else {
            return Ok(TwilioWebhook::Unrecognized);
        };

        if object.contains_key("EventType") {
            let event = serde_json::from_value(raw.clone())
                .map_err(|e| WhatsAppError::InvalidPayload(e.to_string()))?;
            return Ok(TwilioWebhook::Conversations(event));
        }

        if ["SmsMessageSid", "MessageSid", "From"]
            .iter()
            .any(|key| object.contains_key(*key))
        {
            let event = serde_json::from_value(raw.clone())
                .map_err(|e| WhatsAppError::InvalidPayload(e.to_string()))?;
            return Ok(TwilioWebhook::Messaging(event));
        }

        Ok(TwilioWebhook::Unrecognized)
    }
}

/// Conversations API webhook event
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ConversationsEvent {
    pub event_type: String,
    pub account_sid: Option<String>,
    pub conversation_sid: Option<String>,
    pub message_sid: Option<String>,
    pub participant_sid: Option<String>,
    pub author: Option<String>,
    pub body: Option<String>,
    pub source: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub index: Option<String>,
    pub date_created: Option<String>,
    /// JSON-encoded list of media descriptors
    pub media: Option<String>,
    #[serde(rename = "MessagingBinding.Address")]
    pub binding_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConversationMedia {
    content_type: Option<String>,
}

impl ConversationsEvent {
    /// Normalize into the channel-agnostic model; `None` for ignored event types
    pub fn normalize(&self) -> Option<NormalizedWebhookEvent> {
        let conversation_sid = non_empty(&self.conversation_sid)?;

        let kind = match self.event_type.as_str() {
            "onMessageAdded" => EventKind::Message(self.to_message()?),
            "onConversationAdded" => EventKind::ConversationCreated,
            "onMessageUpdated" => EventKind::StatusUpdate(StatusUpdate {
                message_id: self.message_sid.clone().unwrap_or_default(),
                status: MessageStatus::Read,
                watermark: None,
                error: None,
            }),
            "onDeliveryUpdated" => EventKind::StatusUpdate(StatusUpdate {
                message_id: self.message_sid.clone().unwrap_or_default(),
                status: MessageStatus::Delivered,
                watermark: None,
                error: None,
            }),
            other => {
                debug!("Ignoring Conversations event type {}", other);
                return None;
            }
        };

        let contact_identifier = non_empty(&self.author)
            .or_else(|| non_empty(&self.binding_address))
            .unwrap_or(conversation_sid);

        Some(NormalizedWebhookEvent {
            channel: Channel::WhatsApp,
            channel_conversation_id: conversation_sid.to_string(),
            contact_identifier: contact_identifier.to_string(),
            contact_name: None,
            channel_account_id: self.account_sid.clone(),
            kind,
        })
    }

    fn to_message(&self) -> Option<NormalizedMessage> {
        let message_sid = non_empty(&self.message_sid)?;
        let direction = if self.source.as_deref() == Some("SDK") {
            Direction::Outbound
        } else {
            Direction::Inbound
        };

        let media: Vec<ConversationMedia> = self
            .media
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
            .unwrap_or_default();
        let media_content_type = media.first().and_then(|m| m.content_type.clone());
        let content_type = match (&media_content_type, media.is_empty()) {
            (_, true) => ContentType::Text,
            (Some(mime), false) => ContentType::from_mime(mime),
            (None, false) => ContentType::File,
        };

        Some(NormalizedMessage {
            channel_message_id: message_sid.to_string(),
            direction,
            sender_name: self.author.clone(),
            content_type,
            content_text: non_empty(&self.body).map(str::to_string),
            content_media_url: None,
            reply_to_external_id: None,
            timestamp: parse_timestamp(self.date_created.as_deref()),
            metadata: MessageMetadata::WhatsApp(WhatsAppMessageMeta {
                account_sid: self.account_sid.clone(),
                num_media: u32::try_from(media.len()).unwrap_or(u32::MAX),
                media_content_type,
                conversation_sid: self.conversation_sid.clone(),
                participant_sid: self.participant_sid.clone(),
                author: self.author.clone(),
                source: self.source.clone(),
                ..Default::default()
            }),
        })
    }
}

/// Messaging API webhook or status callback
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MessagingEvent {
    pub message_sid: Option<String>,
    pub sms_message_sid: Option<String>,
    pub sms_sid: Option<String>,
    pub account_sid: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub body: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub num_media: Option<String>,
    #[serde(rename = "MediaContentType0")]
    pub media_content_type: Option<String>,
    #[serde(rename = "MediaUrl0")]
    pub media_url: Option<String>,
    pub sms_status: Option<String>,
    pub message_status: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub profile_name: Option<String>,
    pub wa_id: Option<String>,
    pub button_payload: Option<String>,
    pub button_text: Option<String>,
    pub original_replied_message_sid: Option<String>,
}

/// Sub-case of a Messaging API body, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagingKind {
    StatusCallback,
    Reaction,
    Message,
}

impl MessagingEvent {
    pub fn sid(&self) -> Option<&str> {
        non_empty(&self.message_sid)
            .or_else(|| non_empty(&self.sms_message_sid))
            .or_else(|| non_empty(&self.sms_sid))
    }

    pub fn status(&self) -> Option<&str> {
        non_empty(&self.sms_status).or_else(|| non_empty(&self.message_status))
    }

    pub fn num_media(&self) -> u32 {
        self.num_media
            .as_deref()
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(0)
    }

    fn has_body(&self) -> bool {
        non_empty(&self.body).is_some()
    }

    pub fn kind(&self) -> MessagingKind {
        if self.status().is_some() && !self.has_body() && self.num_media() == 0 {
            MessagingKind::StatusCallback
        } else if non_empty(&self.button_payload).is_some()
            && !self.has_body()
            && non_empty(&self.original_replied_message_sid).is_some()
        {
            MessagingKind::Reaction
        } else {
            MessagingKind::Message
        }
    }

    /// Inbound iff `From` is a WhatsApp address that is not the business number.
    ///
    /// With no business number configured every message counts as inbound.
    pub fn is_inbound(&self, business_number: Option<&str>) -> bool {
        let from = self.from.as_deref().unwrap_or_default();
        if !from.starts_with(WHATSAPP_PREFIX) {
            return false;
        }
        match business_number.map(strip_prefix).filter(|n| !n.is_empty()) {
            Some(number) => !from.contains(number),
            None => true,
        }
    }

    /// Normalize into the channel-agnostic model
    pub fn normalize(&self, business_number: Option<&str>) -> Option<NormalizedWebhookEvent> {
        match self.kind() {
            MessagingKind::StatusCallback => self.to_status_update(),
            MessagingKind::Reaction => self.to_reaction(),
            MessagingKind::Message => self.to_message(business_number),
        }
    }

    fn to_status_update(&self) -> Option<NormalizedWebhookEvent> {
        let from = non_empty(&self.from)?;
        let error = if self.error_code.is_some() || self.error_message.is_some() {
            Some(DeliveryError {
                code: self.error_code.clone(),
                message: self.error_message.clone(),
            })
        } else {
            None
        };

        Some(NormalizedWebhookEvent {
            channel: Channel::WhatsApp,
            channel_conversation_id: from.to_string(),
            contact_identifier: from.to_string(),
            contact_name: None,
            channel_account_id: self.account_sid.clone(),
            kind: EventKind::StatusUpdate(StatusUpdate {
                message_id: self.sid().unwrap_or_default().to_string(),
                status: map_status(self.status().unwrap_or_default()),
                watermark: None,
                error,
            }),
        })
    }

    fn to_reaction(&self) -> Option<NormalizedWebhookEvent> {
        let from = non_empty(&self.from)?;
        Some(NormalizedWebhookEvent {
            channel: Channel::WhatsApp,
            channel_conversation_id: from.to_string(),
            contact_identifier: from.to_string(),
            contact_name: self.profile_name.clone(),
            channel_account_id: self.account_sid.clone(),
            kind: EventKind::Reaction(Reaction {
                target_message_id: self.original_replied_message_sid.clone().unwrap_or_default(),
                emoji: self.button_payload.clone().unwrap_or_default(),
                action: "react".to_string(),
            }),
        })
    }

    fn to_message(&self, business_number: Option<&str>) -> Option<NormalizedWebhookEvent> {
        let sid = self.sid()?;
        let inbound = self.is_inbound(business_number);
        let direction = if inbound {
            Direction::Inbound
        } else {
            Direction::Outbound
        };
        let customer = if inbound { &self.from } else { &self.to };
        let customer = non_empty(customer)?;

        let num_media = self.num_media();
        let (content_type, media_url) = if num_media > 0 {
            let mime = self.media_content_type.as_deref().unwrap_or_default();
            (ContentType::from_mime(mime), self.media_url.clone())
        } else {
            (ContentType::Text, None)
        };

        Some(NormalizedWebhookEvent {
            channel: Channel::WhatsApp,
            channel_conversation_id: customer.to_string(),
            contact_identifier: customer.to_string(),
            contact_name: self.profile_name.clone(),
            channel_account_id: self.account_sid.clone(),
            kind: EventKind::Message(NormalizedMessage {
                channel_message_id: sid.to_string(),
                direction,
                sender_name: self.profile_name.clone(),
                content_type,
                content_text: non_empty(&self.body).map(str::to_string),
                content_media_url: media_url,
                reply_to_external_id: non_empty(&self.original_replied_message_sid)
                    .map(str::to_string),
                timestamp: Utc::now(),
                metadata: MessageMetadata::WhatsApp(WhatsAppMessageMeta {
                    account_sid: self.account_sid.clone(),
                    profile_name: self.profile_name.clone(),
                    wa_id: self.wa_id.clone(),
                    num_media,
                    media_content_type: self.media_content_type.clone(),
                    button_payload: self.button_payload.clone(),
                    button_text: self.button_text.clone(),
                    ..Default::default()
                }),
            }),
        })
    }
}

/// Map a Twilio message status (case-insensitive); unknown values count as sent
pub fn map_status(status: &str) -> MessageStatus {
    match status.to_ascii_lowercase().as_str() {
        "delivered" => MessageStatus::Delivered,
        "read" => MessageStatus::Read,
        "failed" | "undelivered" => MessageStatus::Failed,
        _ => MessageStatus::Sent,
    }
}

/// Drop a leading `whatsapp:` from an address
pub fn strip_prefix(address: &str) -> &str {
    address.strip_prefix(WHATSAPP_PREFIX).unwrap_or(address)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Form values are strings, but JSON callers may send counters as numbers
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(match value {
        Some(JsonValue::String(s)) => Some(s),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
