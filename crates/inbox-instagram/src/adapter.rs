//! `ChannelAdapter` implementation for Instagram Direct via the Graph API

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inbox_core::adapter::{
    ChannelAdapter, ChannelCredentials, FetchOptions, OutboundContent, SendResult, UserProfile,
};
use inbox_core::config::{HttpConfig, InstagramConfig};
use inbox_core::event::{NormalizedMessage, NormalizedWebhookEvent};
use inbox_core::types::{Channel, ContentType, Direction, InstagramMessageMeta, MessageMetadata};
use serde_json::Value as JsonValue;
use tracing::{error, warn};

use crate::client::{GraphMessage, InstagramApi, OutgoingMessage};
use crate::error::Result;
use crate::payload::{InstagramWebhook, THREAD_PREFIX};
use crate::signature::verify_payload_signature;

const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Instagram channel adapter
#[derive(Debug, Clone)]
pub struct InstagramAdapter {
    api: InstagramApi,
    business_account_id: Option<String>,
    verify_token: Option<String>,
    app_secret: Option<String>,
}

impl InstagramAdapter {
    pub fn new(api: InstagramApi, business_account_id: Option<String>) -> Self {
        Self {
            api,
            business_account_id,
            verify_token: None,
            app_secret: None,
        }
    }

    pub fn with_verify_token(mut self, token: Option<String>) -> Self {
        self.verify_token = token;
        self
    }

    pub fn with_app_secret(mut self, secret: Option<String>) -> Self {
        self.app_secret = secret;
        self
    }

    /// Build the adapter from configuration
    pub fn from_config(config: &InstagramConfig, http: &HttpConfig) -> Result<Self> {
        let api = InstagramApi::new(config.access_token.clone())
            .with_base_url(config.graph_base_url.clone())
            .with_api_version(config.api_version.clone())
            .with_timeout(Duration::from_secs(http.timeout_secs))?;

        Ok(Self::new(api, config.business_account_id.clone())
            .with_verify_token(config.verify_token.clone())
            .with_app_secret(config.app_secret.clone()))
    }

    /// Whether incoming payloads must carry a valid `X-Hub-Signature-256`
    pub fn requires_signature(&self) -> bool {
        self.app_secret.is_some()
    }

    /// Validate a payload signature; passes when no app secret is configured
    pub fn verify_payload(&self, body: &[u8], signature: Option<&str>) -> bool {
        match (&self.app_secret, signature) {
            (None, _) => true,
            (Some(secret), Some(signature)) => verify_payload_signature(secret, body, signature),
            (Some(_), None) => false,
        }
    }

    fn api_for(&self, credentials: Option<&ChannelCredentials>) -> InstagramApi {
        match credentials {
            Some(ChannelCredentials::Instagram { access_token, .. }) => {
                self.api.with_access_token(access_token)
            }
            Some(other) => {
                warn!(
                    "Ignoring {} credentials passed to the Instagram adapter",
                    other.channel()
                );
                self.api.clone()
            }
            None => self.api.clone(),
        }
    }
}

/// Instagram-scoped user id from a thread key or bare id
fn recipient_id(to: &str) -> &str {
    to.strip_prefix(THREAD_PREFIX).unwrap_or(to)
}

fn attachment_type(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Image => "image",
        ContentType::Video => "video",
        _ => "file",
    }
}

#[async_trait]
impl ChannelAdapter for InstagramAdapter {
    fn channel(&self) -> Channel {
        Channel::Instagram
    }

    async fn send_message(
        &self,
        to: &str,
        content: &OutboundContent,
        credentials: Option<&ChannelCredentials>,
    ) -> SendResult {
        let api = self.api_for(credentials);
        let attachment = match (content.content_type.is_media(), content.media_url.as_deref()) {
            (true, Some(url)) => Some((attachment_type(content.content_type), url)),
            _ => None,
        };
        // The Send API takes either text or an attachment per message
        let message = OutgoingMessage {
            text: if attachment.is_some() {
                None
            } else {
                content.text.as_deref()
            },
            attachment,
            reply_to: content.reply_to.as_deref(),
        };

        match api.send_message(recipient_id(to), &message).await {
            Ok(response) => SendResult::sent(response.message_id),
            Err(e) => {
                error!("Failed to send Instagram message to {}: {}", to, e);
                SendResult::failed(e.to_string())
            }
        }
    }

    async fn send_template_message(
        &self,
        to: &str,
        template_id: &str,
        _variables: &BTreeMap<String, String>,
        _credentials: Option<&ChannelCredentials>,
    ) -> SendResult {
        warn!(
            "Template {} requested for Instagram recipient {}; not supported",
            template_id, to
        );
        SendResult::failed("Instagram does not support template messages")
    }

    fn parse_webhook_events(&self, raw: &JsonValue) -> Vec<NormalizedWebhookEvent> {
        match serde_json::from_value::<InstagramWebhook>(raw.clone()) {
            Ok(webhook) => webhook.normalize(self.business_account_id.as_deref()),
            Err(e) => {
                warn!("Unparseable Instagram webhook: {}", e);
                Vec::new()
            }
        }
    }

    fn verify_webhook(&self, token: &str) -> bool {
        self.verify_token.as_deref() == Some(token)
    }

    async fn fetch_messages(
        &self,
        channel_conversation_id: &str,
        options: &FetchOptions,
    ) -> Vec<NormalizedMessage> {
        let user_id = recipient_id(channel_conversation_id);
        let limit = options.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

        let messages = match self.api.get_conversation_messages(user_id, limit).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    "Failed to fetch Instagram history for {}: {}",
                    channel_conversation_id, e
                );
                return Vec::new();
            }
        };

        let mut history: Vec<NormalizedMessage> = messages
            .into_iter()
            .map(|m| self.to_normalized(m))
            .filter(|m| options.before.is_none_or(|before| m.timestamp < before))
            .collect();
        history.sort_by_key(|m| m.timestamp);
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        history
    }

    async fn fetch_user_profile(
        &self,
        user_id: &str,
        credentials: Option<&ChannelCredentials>,
    ) -> Option<UserProfile> {
        let api = self.api_for(credentials);
        match api.get_user_profile(user_id).await {
            Ok(profile) => Some(UserProfile {
                id: profile.id,
                name: profile.name,
                username: profile.username,
                avatar_url: profile.profile_pic,
            }),
            Err(e) => {
                warn!("Instagram profile lookup failed for {}: {}", user_id, e);
                None
            }
        }
    }
}

impl InstagramAdapter {
    fn to_normalized(&self, message: GraphMessage) -> NormalizedMessage {
        let sender = message.from.as_ref();
        let outbound = match (&self.business_account_id, sender) {
            (Some(business), Some(from)) => &from.id == business,
            _ => false,
        };
        let timestamp = message
            .created_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%z").ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        NormalizedMessage {
            channel_message_id: message.id,
            direction: if outbound {
                Direction::Outbound
            } else {
                Direction::Inbound
            },
            sender_name: sender.and_then(|s| s.username.clone()),
            content_type: ContentType::Text,
            content_text: message.message.filter(|m| !m.is_empty()),
            content_media_url: None,
            reply_to_external_id: None,
            timestamp,
            metadata: MessageMetadata::Instagram(InstagramMessageMeta::default()),
        }
    }
}
