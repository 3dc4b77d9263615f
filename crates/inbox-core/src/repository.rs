//! Collaborator contracts consumed by the reconciliation engine
//!
//! Persistence, tenant lookup and live-update broadcasting live outside the
//! engine. Operations that only some backends support have default
//! implementations returning [`Error::CapabilityMissing`], so callers fail
//! loudly instead of silently skipping work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::adapter::ChannelCredentials;
use crate::types::{
    Channel, ContactChannelProfile, Conversation, ConversationUpdate, DeliveryError, Message,
    MessageStatus, NewConversation, NewMessage, TenantContext,
};
use crate::{Error, Result};

/// Conversation persistence
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_channel_conversation_id(
        &self,
        channel_conversation_id: &str,
    ) -> Result<Option<Conversation>>;

    async fn find_one(&self, id: &str) -> Result<Option<Conversation>>;

    /// Insert a conversation; `Error::Duplicate` when the thread key exists
    async fn create(&self, conversation: NewConversation) -> Result<Conversation>;

    /// Apply a partial update and return the stored row
    async fn update(&self, id: &str, update: ConversationUpdate) -> Result<Conversation>;

    /// Atomically add one to `unread_count`
    async fn increment_unread_count(&self, id: &str) -> Result<()>;

    /// Reset `unread_count` to zero
    async fn mark_read(&self, id: &str) -> Result<Conversation>;

    /// Outbound messages of a conversation created at or before `timestamp`
    async fn find_outbound_before_timestamp(
        &self,
        _conversation_id: &str,
        _timestamp: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        Err(Error::CapabilityMissing("find_outbound_before_timestamp"))
    }
}

/// Message persistence
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_channel_message_id(&self, channel_message_id: &str) -> Result<Option<Message>>;

    async fn find_one(&self, id: &str) -> Result<Option<Message>>;

    /// Insert a message; `Error::Duplicate` when the channel message id exists
    async fn create(&self, message: NewMessage) -> Result<Message>;

    /// Set the status of a message; `error` replaces any stored error metadata.
    /// Returns the number of rows touched.
    async fn update_status(
        &self,
        channel_message_id: &str,
        status: MessageStatus,
        error: Option<DeliveryError>,
    ) -> Result<usize>;

    /// Mark a failed message as re-sent under a new provider id
    async fn record_resend(&self, id: &str, channel_message_id: &str) -> Result<Message>;

    /// Messages of a conversation, oldest first
    async fn list_by_conversation(
        &self,
        _conversation_id: &str,
        _limit: usize,
    ) -> Result<Vec<Message>> {
        Err(Error::CapabilityMissing("list_by_conversation"))
    }
}

/// Cached per-channel contact profiles
#[async_trait]
pub trait ContactProfileStore: Send + Sync {
    async fn find_by_channel_identifier(
        &self,
        channel: Channel,
        contact_identifier: &str,
    ) -> Result<Option<ContactChannelProfile>>;

    async fn create(
        &self,
        channel: Channel,
        contact_identifier: &str,
        display_name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<ContactChannelProfile>;

    async fn update(
        &self,
        id: &str,
        display_name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<ContactChannelProfile>;
}

/// Maps a channel identifier to its tenant
#[async_trait]
pub trait TenantResolver: Send + Sync {
    async fn resolve(&self, channel: Channel, identifier: &str) -> Result<Option<TenantContext>>;
}

/// Maps a tenant's channel configuration to adapter credentials
#[async_trait]
pub trait CredentialsResolver: Send + Sync {
    async fn resolve(&self, channel_config_id: &str) -> Option<ChannelCredentials>;
}

/// Live-update broadcast
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit_new_message(&self, conversation_id: &str, message: &Message) -> Result<()>;

    async fn emit_conversation_update(&self, conversation: &Conversation) -> Result<()>;

    async fn emit_message_status_update(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<()>;
}

/// Sink that drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn emit_new_message(&self, _conversation_id: &str, _message: &Message) -> Result<()> {
        Ok(())
    }

    async fn emit_conversation_update(&self, _conversation: &Conversation) -> Result<()> {
        Ok(())
    }

    async fn emit_message_status_update(
        &self,
        _conversation_id: &str,
        _message_id: &str,
        _status: MessageStatus,
    ) -> Result<()> {
        Ok(())
    }
}
