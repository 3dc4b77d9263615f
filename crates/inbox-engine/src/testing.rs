//! Fakes shared by the engine tests

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inbox_core::adapter::{
    ChannelAdapter, ChannelCredentials, FetchOptions, OutboundContent, SendResult, UserProfile,
};
use inbox_core::event::{NormalizedMessage, NormalizedWebhookEvent};
use inbox_core::repository::{
    ConversationRepository, MessageRepository, NotificationSink, TenantResolver,
};
use inbox_core::store::SqliteStore;
use inbox_core::types::{
    Channel, Conversation, ConversationUpdate, DeliveryError, Message, MessageStatus,
    NewConversation, NewMessage, TenantContext,
};
use inbox_core::{Error, Result};
use serde_json::Value as JsonValue;

/// A notification captured by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NewMessage { conversation_id: String, message_id: String },
    ConversationUpdate { conversation_id: String, contact_name: Option<String> },
    StatusUpdate { conversation_id: String, message_id: String, status: MessageStatus },
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<Notification>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }

    pub fn status_updates(&self) -> usize {
        self.events()
            .iter()
            .filter(|n| matches!(n, Notification::StatusUpdate { .. }))
            .count()
    }

    fn record(&self, notification: Notification) -> Result<()> {
        self.events.lock().unwrap().push(notification);
        if self.fail {
            return Err(Error::Notification("sink offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn emit_new_message(&self, conversation_id: &str, message: &Message) -> Result<()> {
        self.record(Notification::NewMessage {
            conversation_id: conversation_id.to_string(),
            message_id: message.id.clone(),
        })
    }

    async fn emit_conversation_update(&self, conversation: &Conversation) -> Result<()> {
        self.record(Notification::ConversationUpdate {
            conversation_id: conversation.id.clone(),
            contact_name: conversation.contact_name.clone(),
        })
    }

    async fn emit_message_status_update(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<()> {
        self.record(Notification::StatusUpdate {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            status,
        })
    }
}

/// A send captured by [`FakeAdapter`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub to: String,
    pub text: Option<String>,
    pub template_id: Option<String>,
    pub reply_to: Option<String>,
    pub credentials: Option<ChannelCredentials>,
}

pub struct FakeAdapter {
    pub channel: Channel,
    pub result: Mutex<SendResult>,
    pub sent: Mutex<Vec<SentMessage>>,
    pub profile: Option<UserProfile>,
}

impl FakeAdapter {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            result: Mutex::new(SendResult::sent(Some("PROVIDER-1".to_string()))),
            sent: Mutex::new(Vec::new()),
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn set_result(&self, result: SendResult) {
        *self.result.lock().unwrap() = result;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelAdapter for FakeAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send_message(
        &self,
        to: &str,
        content: &OutboundContent,
        credentials: Option<&ChannelCredentials>,
    ) -> SendResult {
        self.sent.lock().unwrap().push(SentMessage {
            to: to.to_string(),
            text: content.text.clone(),
            template_id: None,
            reply_to: content.reply_to.clone(),
            credentials: credentials.cloned(),
        });
        self.result.lock().unwrap().clone()
    }

    async fn send_template_message(
        &self,
        to: &str,
        template_id: &str,
        _variables: &BTreeMap<String, String>,
        credentials: Option<&ChannelCredentials>,
    ) -> SendResult {
        self.sent.lock().unwrap().push(SentMessage {
            to: to.to_string(),
            text: None,
            template_id: Some(template_id.to_string()),
            reply_to: None,
            credentials: credentials.cloned(),
        });
        self.result.lock().unwrap().clone()
    }

    fn parse_webhook_events(&self, _raw: &JsonValue) -> Vec<NormalizedWebhookEvent> {
        Vec::new()
    }

    fn verify_webhook(&self, _token: &str) -> bool {
        false
    }

    async fn fetch_messages(
        &self,
        _channel_conversation_id: &str,
        _options: &FetchOptions,
    ) -> Vec<NormalizedMessage> {
        Vec::new()
    }

    async fn fetch_user_profile(
        &self,
        _user_id: &str,
        _credentials: Option<&ChannelCredentials>,
    ) -> Option<UserProfile> {
        self.profile.clone()
    }
}

/// Resolver returning one fixed tenant, or an error
pub struct StaticTenantResolver(pub Option<TenantContext>, pub bool);

#[async_trait]
impl TenantResolver for StaticTenantResolver {
    async fn resolve(&self, _channel: Channel, _identifier: &str) -> Result<Option<TenantContext>> {
        if self.1 {
            return Err(Error::Tenant("directory unavailable".to_string()));
        }
        Ok(self.0.clone())
    }
}

pub fn tenant(clinic_id: &str) -> TenantContext {
    TenantContext {
        clinic_id: clinic_id.to_string(),
        region_id: Some("region-1".to_string()),
        channel_config_id: Some("cfg-1".to_string()),
    }
}

/// Poll `check` until it holds or a second has passed
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Store that yields to the scheduler after every lookup, so joined futures
/// interleave between their existence check and their insert
pub struct YieldingStore {
    pub store: SqliteStore,
    pub conversation_creates: AtomicUsize,
    pub message_creates: AtomicUsize,
}

impl YieldingStore {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            store,
            conversation_creates: AtomicUsize::new(0),
            message_creates: AtomicUsize::new(0),
        }
    }

    pub fn conversation_creates(&self) -> usize {
        self.conversation_creates.load(Ordering::SeqCst)
    }

    pub fn message_creates(&self) -> usize {
        self.message_creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationRepository for YieldingStore {
    async fn find_by_channel_conversation_id(
        &self,
        channel_conversation_id: &str,
    ) -> Result<Option<Conversation>> {
        let found = self
            .store
            .find_by_channel_conversation_id(channel_conversation_id)
            .await;
        tokio::task::yield_now().await;
        found
    }

    async fn find_one(&self, id: &str) -> Result<Option<Conversation>> {
        let found = ConversationRepository::find_one(&self.store, id).await;
        tokio::task::yield_now().await;
        found
    }

    async fn create(&self, conversation: NewConversation) -> Result<Conversation> {
        self.conversation_creates.fetch_add(1, Ordering::SeqCst);
        ConversationRepository::create(&self.store, conversation).await
    }

    async fn update(&self, id: &str, update: ConversationUpdate) -> Result<Conversation> {
        self.store.update(id, update).await
    }

    async fn increment_unread_count(&self, id: &str) -> Result<()> {
        self.store.increment_unread_count(id).await
    }

    async fn mark_read(&self, id: &str) -> Result<Conversation> {
        self.store.mark_read(id).await
    }

    async fn find_outbound_before_timestamp(
        &self,
        conversation_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        self.store
            .find_outbound_before_timestamp(conversation_id, timestamp)
            .await
    }
}

#[async_trait]
impl MessageRepository for YieldingStore {
    async fn find_by_channel_message_id(&self, channel_message_id: &str) -> Result<Option<Message>> {
        let found = self.store.find_by_channel_message_id(channel_message_id).await;
        tokio::task::yield_now().await;
        found
    }

    async fn find_one(&self, id: &str) -> Result<Option<Message>> {
        let found = MessageRepository::find_one(&self.store, id).await;
        tokio::task::yield_now().await;
        found
    }

    async fn create(&self, message: NewMessage) -> Result<Message> {
        self.message_creates.fetch_add(1, Ordering::SeqCst);
        MessageRepository::create(&self.store, message).await
    }

    async fn update_status(
        &self,
        channel_message_id: &str,
        status: MessageStatus,
        error: Option<DeliveryError>,
    ) -> Result<usize> {
        self.store
            .update_status(channel_message_id, status, error)
            .await
    }

    async fn record_resend(&self, id: &str, channel_message_id: &str) -> Result<Message> {
        self.store.record_resend(id, channel_message_id).await
    }

    async fn list_by_conversation(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>> {
        self.store.list_by_conversation(conversation_id, limit).await
    }
}
