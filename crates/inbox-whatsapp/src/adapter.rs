//! `ChannelAdapter` implementation for WhatsApp via Twilio

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inbox_core::adapter::{ChannelAdapter, ChannelCredentials, FetchOptions, OutboundContent, SendResult};
use inbox_core::config::{HttpConfig, WhatsAppConfig};
use inbox_core::event::{NormalizedMessage, NormalizedWebhookEvent};
use inbox_core::types::{Channel, ContentType, Direction, MessageMetadata, WhatsAppMessageMeta};
use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};

use crate::client::{TwilioClient, TwilioMessage, verify_signature};
use crate::error::Result;
use crate::payload::TwilioWebhook;

const DEFAULT_HISTORY_LIMIT: usize = 50;

/// WhatsApp channel adapter
#[derive(Debug, Clone)]
pub struct WhatsAppAdapter {
    client: TwilioClient,
    verify_token: Option<String>,
}

impl WhatsAppAdapter {
    pub fn new(client: TwilioClient, verify_token: Option<String>) -> Self {
        Self {
            client,
            verify_token,
        }
    }

    /// Build the adapter from configuration
    pub fn from_config(config: &WhatsAppConfig, http: &HttpConfig) -> Result<Self> {
        let client = TwilioClient::new(
            config.account_sid.clone(),
            config.auth_token.clone(),
            config.phone_number.clone(),
        )
        .with_base_url(config.api_base_url.clone())
        .with_timeout(Duration::from_secs(http.timeout_secs))?;

        Ok(Self::new(client, config.verify_token.clone()))
    }

    /// Business number used for direction inference
    pub fn business_number(&self) -> Option<&str> {
        self.client.phone_number()
    }

    /// Check an `X-Twilio-Signature` header with the configured auth token
    pub fn verify_request_signature(
        &self,
        url: &str,
        params: &BTreeMap<String, String>,
        signature: &str,
    ) -> bool {
        verify_signature(self.client.auth_token(), url, params, signature)
    }

    fn client_for(&self, credentials: Option<&ChannelCredentials>) -> TwilioClient {
        match credentials {
            Some(ChannelCredentials::WhatsApp {
                account_sid,
                auth_token,
                phone_number,
            }) => self.client.with_credentials(account_sid, auth_token, phone_number),
            Some(other) => {
                warn!(
                    "Ignoring {} credentials passed to the WhatsApp adapter",
                    other.channel()
                );
                self.client.clone()
            }
            None => self.client.clone(),
        }
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppAdapter {
    fn channel(&self) -> Channel {
        Channel::WhatsApp
    }

    async fn send_message(
        &self,
        to: &str,
        content: &OutboundContent,
        credentials: Option<&ChannelCredentials>,
    ) -> SendResult {
        let client = self.client_for(credentials);
        let media_url = if content.content_type.is_media() {
            content.media_url.as_deref()
        } else {
            None
        };
        if content.reply_to.is_some() {
            debug!("Twilio Messages API has no reply context; sending without it");
        }

        match client
            .send_message(to, content.text.as_deref(), media_url)
            .await
        {
            Ok(sid) => SendResult::sent(Some(sid)),
            Err(e) => {
                error!("Failed to send WhatsApp message to {}: {}", to, e);
                SendResult::failed(e.to_string())
            }
        }
    }

    async fn send_template_message(
        &self,
        to: &str,
        template_id: &str,
        variables: &BTreeMap<String, String>,
        credentials: Option<&ChannelCredentials>,
    ) -> SendResult {
        let client = self.client_for(credentials);
        match client.send_template(to, template_id, variables).await {
            Ok(sid) => SendResult::sent(Some(sid)),
            Err(e) => {
                error!("Failed to send WhatsApp template to {}: {}", to, e);
                SendResult::failed(e.to_string())
            }
        }
    }

    fn parse_webhook_events(&self, raw: &JsonValue) -> Vec<NormalizedWebhookEvent> {
        let parsed = match TwilioWebhook::from_value(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Unparseable Twilio webhook: {}", e);
                return Vec::new();
            }
        };

        let event = match parsed {
            TwilioWebhook::Conversations(event) => event.normalize(),
            TwilioWebhook::Messaging(event) => event.normalize(self.business_number()),
            TwilioWebhook::Unrecognized => {
                warn!("Unrecognized Twilio webhook shape");
                None
            }
        };

        event.into_iter().collect()
    }

    fn verify_webhook(&self, token: &str) -> bool {
        self.verify_token.as_deref() == Some(token)
    }

    async fn fetch_messages(
        &self,
        channel_conversation_id: &str,
        options: &FetchOptions,
    ) -> Vec<NormalizedMessage> {
        let limit = options.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let messages = match self.client.list_messages(channel_conversation_id, limit).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    "Failed to fetch WhatsApp history for {}: {}",
                    channel_conversation_id, e
                );
                return Vec::new();
            }
        };

        let mut history: Vec<NormalizedMessage> = messages
            .into_iter()
            .map(to_normalized)
            .filter(|m| options.before.is_none_or(|before| m.timestamp < before))
            .collect();
        history.sort_by_key(|m| m.timestamp);
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        history
    }
}

fn to_normalized(message: TwilioMessage) -> NormalizedMessage {
    let direction = match message.direction.as_deref() {
        Some("inbound") => Direction::Inbound,
        _ => Direction::Outbound,
    };
    let timestamp = message
        .date_created
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let num_media = message
        .num_media
        .as_deref()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);

    NormalizedMessage {
        channel_message_id: message.sid,
        direction,
        sender_name: None,
        content_type: if num_media > 0 {
            ContentType::File
        } else {
            ContentType::Text
        },
        content_text: message.body.filter(|b| !b.is_empty()),
        content_media_url: None,
        reply_to_external_id: None,
        timestamp,
        metadata: MessageMetadata::WhatsApp(WhatsAppMessageMeta {
            num_media,
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inbox_core::event::EventKind;
    use inbox_core::types::MessageStatus;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(business_number: Option<&str>) -> WhatsAppAdapter {
        WhatsAppAdapter::new(
            TwilioClient::new(
                "AC123".to_string(),
                "token123".to_string(),
                business_number.map(str::to_string),
            ),
            Some("verify-me".to_string()),
        )
    }

    #[test]
    fn test_conversations_message_added() {
        let raw = json!({
            "EventType": "onMessageAdded",
            "ConversationSid": "CH123",
            "MessageSid": "IM1",
            "AccountSid": "AC123",
            "Author": "whatsapp:+15550001111",
            "Body": "hi",
            "Source": "API"
        });

        let event = adapter(None).parse_webhook_payload(&raw).unwrap();
        assert_eq!(event.channel_conversation_id, "CH123");
        assert_eq!(event.contact_identifier, "whatsapp:+15550001111");
        assert_eq!(event.channel_account_id.as_deref(), Some("AC123"));
        let EventKind::Message(message) = event.kind else {
            panic!("expected message");
        };
        assert_eq!(message.direction, Direction::Inbound);
        assert_eq!(message.content_text.as_deref(), Some("hi"));
        assert_eq!(message.content_type, ContentType::Text);
    }

    #[test]
    fn test_conversations_sdk_source_is_outbound() {
        let raw = json!({
            "EventType": "onMessageAdded",
            "ConversationSid": "CH123",
            "MessageSid": "IM2",
            "Author": "agent@clinic",
            "Body": "hello",
            "Source": "SDK"
        });

        let event = adapter(None).parse_webhook_payload(&raw).unwrap();
        let EventKind::Message(message) = event.kind else {
            panic!("expected message");
        };
        assert_eq!(message.direction, Direction::Outbound);
    }

    #[test]
    fn test_conversations_lifecycle_events() {
        let adapter = adapter(None);

        let created = adapter
            .parse_webhook_payload(&json!({"EventType": "onConversationAdded", "ConversationSid": "CH9"}))
            .unwrap();
        assert_eq!(created.kind, EventKind::ConversationCreated);
        assert_eq!(created.contact_identifier, "CH9");

        let read = adapter
            .parse_webhook_payload(&json!({
                "EventType": "onMessageUpdated", "ConversationSid": "CH9", "MessageSid": "IM1"
            }))
            .unwrap();
        let EventKind::StatusUpdate(update) = read.kind else {
            panic!("expected status update");
        };
        assert_eq!(update.status, MessageStatus::Read);
        assert_eq!(update.message_id, "IM1");

        let delivered = adapter
            .parse_webhook_payload(&json!({
                "EventType": "onDeliveryUpdated", "ConversationSid": "CH9", "MessageSid": "IM1"
            }))
            .unwrap();
        let EventKind::StatusUpdate(update) = delivered.kind else {
            panic!("expected status update");
        };
        assert_eq!(update.status, MessageStatus::Delivered);
    }

    #[test]
    fn test_status_callback() {
        let raw = json!({
            "MessageSid": "SM1",
            "SmsStatus": "delivered",
            "From": "whatsapp:+15559990000",
            "To": "whatsapp:+15550001111",
            "AccountSid": "AC123"
        });

        let event = adapter(Some("+15559990000")).parse_webhook_payload(&raw).unwrap();
        assert_eq!(event.channel_conversation_id, "whatsapp:+15559990000");
        let EventKind::StatusUpdate(update) = event.kind else {
            panic!("expected status update");
        };
        assert_eq!(update.message_id, "SM1");
        assert_eq!(update.status, MessageStatus::Delivered);
        assert!(update.error.is_none());
    }

    #[test]
    fn test_failed_status_carries_error() {
        let raw = json!({
            "MessageSid": "SM1",
            "MessageStatus": "undelivered",
            "ErrorCode": "63016",
            "ErrorMessage": "Outside the 24h window",
            "From": "whatsapp:+15559990000"
        });

        let event = adapter(None).parse_webhook_payload(&raw).unwrap();
        let EventKind::StatusUpdate(update) = event.kind else {
            panic!("expected status update");
        };
        assert_eq!(update.status, MessageStatus::Failed);
        let error = update.error.unwrap();
        assert_eq!(error.code.as_deref(), Some("63016"));
    }

    #[test]
    fn test_reaction() {
        let raw = json!({
            "MessageSid": "SM5",
            "ButtonPayload": "❤️",
            "OriginalRepliedMessageSid": "SM1",
            "From": "whatsapp:+15550001111"
        });

        let event = adapter(None).parse_webhook_payload(&raw).unwrap();
        let EventKind::Reaction(reaction) = event.kind else {
            panic!("expected reaction");
        };
        assert_eq!(reaction.target_message_id, "SM1");
        assert_eq!(reaction.action, "react");
    }

    #[test]
    fn test_inbound_media_message() {
        let raw = json!({
            "MessageSid": "SM2",
            "From": "whatsapp:+15550001111",
            "To": "whatsapp:+15559990000",
            "Body": "",
            "NumMedia": "1",
            "MediaContentType0": "video/mp4",
            "MediaUrl0": "https://api.twilio.com/media/ME1",
            "ProfileName": "Jane",
            "OriginalRepliedMessageSid": "SM1"
        });

        let event = adapter(Some("whatsapp:+15559990000"))
            .parse_webhook_payload(&raw)
            .unwrap();
        assert_eq!(event.contact_name.as_deref(), Some("Jane"));
        let EventKind::Message(message) = event.kind else {
            panic!("expected message");
        };
        assert_eq!(message.direction, Direction::Inbound);
        assert_eq!(message.content_type, ContentType::Video);
        assert_eq!(message.content_media_url.as_deref(), Some("https://api.twilio.com/media/ME1"));
        assert_eq!(message.reply_to_external_id.as_deref(), Some("SM1"));
        assert!(message.content_text.is_none());
    }

    #[test]
    fn test_outbound_echo_threads_on_customer() {
        let raw = json!({
            "MessageSid": "SM3",
            "From": "whatsapp:+15559990000",
            "To": "whatsapp:+15550001111",
            "Body": "sent from the phone"
        });

        let event = adapter(Some("+15559990000")).parse_webhook_payload(&raw).unwrap();
        assert_eq!(event.channel_conversation_id, "whatsapp:+15550001111");
        let EventKind::Message(message) = event.kind else {
            panic!("expected message");
        };
        assert_eq!(message.direction, Direction::Outbound);
    }

    #[test]
    fn test_no_business_number_defaults_to_inbound() {
        let raw = json!({
            "MessageSid": "SM3",
            "From": "whatsapp:+15559990000",
            "To": "whatsapp:+15550001111",
            "Body": "ambiguous"
        });

        let event = adapter(None).parse_webhook_payload(&raw).unwrap();
        let EventKind::Message(message) = event.kind else {
            panic!("expected message");
        };
        assert_eq!(message.direction, Direction::Inbound);
    }

    #[test]
    fn test_unrecognized_payload() {
        let adapter = adapter(None);
        assert!(adapter.parse_webhook_payload(&json!({"hello": "world"})).is_none());
        assert!(adapter.parse_webhook_events(&json!("text")).is_empty());
    }

    #[test]
    fn test_verify_webhook() {
        let adapter = adapter(None);
        assert!(adapter.verify_webhook("verify-me"));
        assert!(!adapter.verify_webhook("nope"));
    }

    #[tokio::test]
    async fn test_send_failure_becomes_failed_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let adapter = WhatsAppAdapter::new(
            TwilioClient::new("AC1".to_string(), "t".to_string(), Some("+1".to_string()))
                .with_base_url(server.uri()),
            None,
        );
        let result = adapter
            .send_message("+15550001111", &OutboundContent::text("hi"), None)
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_credentials_override() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(wiremock::matchers::path("/2010-04-01/Accounts/AC999/Messages.json"))
            .and(body_string_contains("From=whatsapp%3A%2B15558880000"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "SM9"})))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = WhatsAppAdapter::new(
            TwilioClient::new("AC1".to_string(), "t".to_string(), Some("+1".to_string()))
                .with_base_url(server.uri()),
            None,
        );
        let credentials = ChannelCredentials::WhatsApp {
            account_sid: "AC999".to_string(),
            auth_token: "tenant".to_string(),
            phone_number: "+15558880000".to_string(),
        };
        let result = adapter
            .send_message("+15550001111", &OutboundContent::text("hi"), Some(&credentials))
            .await;
        assert!(result.success);
        assert_eq!(result.channel_message_id.as_deref(), Some("SM9"));
    }

    #[tokio::test]
    async fn test_fetch_messages_is_best_effort() {
        // No phone number configured: the client refuses before any HTTP call
        let adapter = WhatsAppAdapter::new(
            TwilioClient::new("AC1".to_string(), "t".to_string(), None),
            None,
        );
        let history = adapter
            .fetch_messages("whatsapp:+15550001111", &FetchOptions::default())
            .await;
        assert!(history.is_empty());
    }
}
