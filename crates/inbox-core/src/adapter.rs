//! Channel adapter trait
//!
//! One implementation per external channel. Adapters never return errors:
//! sends degrade to a failed [`SendResult`], parsing to no events, history and
//! profile lookups to empty results.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::event::{NormalizedMessage, NormalizedWebhookEvent};
use crate::types::{Channel, ContentType};

/// Result of an outbound send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub channel_message_id: Option<String>,
    pub error: Option<String>,
}

impl SendResult {
    pub fn sent(channel_message_id: Option<String>) -> Self {
        Self {
            success: true,
            channel_message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            channel_message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Content of an outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundContent {
    pub content_type: ContentType,
    pub text: Option<String>,
    pub media_url: Option<String>,
    /// Channel message id being replied to
    pub reply_to: Option<String>,
}

impl OutboundContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Text,
            text: Some(text.into()),
            media_url: None,
            reply_to: None,
        }
    }
}

/// Per-tenant credentials replacing an adapter's configured ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum ChannelCredentials {
    WhatsApp {
        account_sid: String,
        auth_token: String,
        phone_number: String,
    },
    Instagram {
        access_token: String,
        business_account_id: Option<String>,
    },
}

impl ChannelCredentials {
    pub fn channel(&self) -> Channel {
        match self {
            ChannelCredentials::WhatsApp { .. } => Channel::WhatsApp,
            ChannelCredentials::Instagram { .. } => Channel::Instagram,
        }
    }
}

/// History paging options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub limit: Option<usize>,
    pub before: Option<DateTime<Utc>>,
}

/// Public profile of a channel user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Best display name: full name, then username
    pub fn display_name(&self) -> Option<String> {
        self.name
            .as_ref()
            .or(self.username.as_ref())
            .filter(|n| !n.trim().is_empty())
            .cloned()
    }
}

/// Contract implemented once per channel
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter speaks for
    fn channel(&self) -> Channel;

    /// Send a message; provider failures come back as `success == false`
    async fn send_message(
        &self,
        to: &str,
        content: &OutboundContent,
        credentials: Option<&ChannelCredentials>,
    ) -> SendResult;

    /// Send a pre-approved template message
    async fn send_template_message(
        &self,
        to: &str,
        template_id: &str,
        variables: &BTreeMap<String, String>,
        credentials: Option<&ChannelCredentials>,
    ) -> SendResult;

    /// Parse every event carried by a raw webhook payload, in order
    fn parse_webhook_events(&self, raw: &JsonValue) -> Vec<NormalizedWebhookEvent>;

    /// Parse the first event of a raw webhook payload
    fn parse_webhook_payload(&self, raw: &JsonValue) -> Option<NormalizedWebhookEvent> {
        self.parse_webhook_events(raw).into_iter().next()
    }

    /// Check a subscription-handshake token against the configured secret
    fn verify_webhook(&self, token: &str) -> bool;

    /// Best-effort history pull
    async fn fetch_messages(
        &self,
        channel_conversation_id: &str,
        options: &FetchOptions,
    ) -> Vec<NormalizedMessage>;

    /// Look up a user's public profile, when the channel supports it
    async fn fetch_user_profile(
        &self,
        _user_id: &str,
        _credentials: Option<&ChannelCredentials>,
    ) -> Option<UserProfile> {
        None
    }
}

/// Adapters keyed by channel
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for its channel
    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        self.adapters.insert(adapter.channel(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel).cloned()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.adapters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
