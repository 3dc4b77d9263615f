//! Webhook reconciliation engine
//!
//! Turns normalized webhook events into idempotent persistent state changes:
//! conversations are created or backfilled, messages recorded exactly once per
//! `channel_message_id`, delivery/read receipts applied, and live updates
//! pushed to the notification sink.
//!
//! The engine never fails a delivery. Every error is logged and reported as
//! [`ProcessOutcome::Failed`] so webhook handlers can always acknowledge.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use inbox_core::adapter::{AdapterRegistry, ChannelAdapter};
use inbox_core::event::{EventKind, NormalizedMessage, NormalizedWebhookEvent, StatusUpdate};
use inbox_core::repository::{
    ContactProfileStore, ConversationRepository, CredentialsResolver, MessageRepository,
    NotificationSink, TenantResolver,
};
use inbox_core::types::{
    Channel, Conversation, ConversationUpdate, Direction, Message, MessageStatus, NewConversation,
    NewMessage, TenantContext, looks_like_raw_id, message_preview, truncate_preview,
};
use inbox_core::{Error, Result};
use tracing::{debug, error, info, warn};

/// What processing one event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    MessageCreated {
        conversation_id: String,
        message_id: String,
    },
    /// The message was already recorded
    Duplicate,
    /// Number of messages whose status changed
    StatusUpdated { count: usize },
    ConversationSeeded { conversation_id: String },
    ConversationExists { conversation_id: String },
    Ignored,
    Failed(String),
}

/// Reconciles normalized webhook events with the inbox store
#[derive(Clone)]
pub struct ReconciliationEngine {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    notifications: Arc<dyn NotificationSink>,
    adapters: AdapterRegistry,
    tenants: Option<Arc<dyn TenantResolver>>,
    credentials: Option<Arc<dyn CredentialsResolver>>,
    profiles: Option<Arc<dyn ContactProfileStore>>,
}

impl ReconciliationEngine {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<dyn NotificationSink>,
        adapters: AdapterRegistry,
    ) -> Self {
        Self {
            conversations,
            messages,
            notifications,
            adapters,
            tenants: None,
            credentials: None,
            profiles: None,
        }
    }

    pub fn with_tenant_resolver(mut self, resolver: Arc<dyn TenantResolver>) -> Self {
        self.tenants = Some(resolver);
        self
    }

    pub fn with_credentials_resolver(mut self, resolver: Arc<dyn CredentialsResolver>) -> Self {
        self.credentials = Some(resolver);
        self
    }

    pub fn with_profile_store(mut self, profiles: Arc<dyn ContactProfileStore>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Process events one after another, in payload order
    pub async fn process_events(&self, events: &[NormalizedWebhookEvent]) -> Vec<ProcessOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.process_event(event).await);
        }
        outcomes
    }

    /// Process one event; never returns an error
    pub async fn process_event(&self, event: &NormalizedWebhookEvent) -> ProcessOutcome {
        debug!(
            "Processing {} event for {} ({})",
            event.kind.name(),
            event.channel_conversation_id,
            event.channel
        );

        let result = match &event.kind {
            EventKind::Message(message) => self.handle_message(event, message).await,
            EventKind::StatusUpdate(update) => self.handle_status_update(event, update).await,
            EventKind::ConversationCreated => self.handle_conversation_created(event).await,
            EventKind::Reaction(reaction) => {
                info!(
                    "Ignoring {} reaction {} on {}",
                    reaction.action, reaction.emoji, reaction.target_message_id
                );
                Ok(ProcessOutcome::Ignored)
            }
        };

        result.unwrap_or_else(|e| {
            error!(
                "Failed to process {} event for {}: {}",
                event.kind.name(),
                event.channel_conversation_id,
                e
            );
            ProcessOutcome::Failed(e.to_string())
        })
    }

    async fn handle_message(
        &self,
        event: &NormalizedWebhookEvent,
        incoming: &NormalizedMessage,
    ) -> Result<ProcessOutcome> {
        // Duplicate deliveries must not touch the conversation at all
        if self
            .messages
            .find_by_channel_message_id(&incoming.channel_message_id)
            .await?
            .is_some()
        {
            debug!("Duplicate delivery of {}", incoming.channel_message_id);
            return Ok(ProcessOutcome::Duplicate);
        }

        let inbound = incoming.direction == Direction::Inbound;
        let tenant = self.resolve_tenant(event).await;
        let conversation = self.upsert_conversation(event, incoming, tenant).await?;

        let sender_name = if inbound {
            conversation
                .contact_name
                .clone()
                .or_else(|| incoming.sender_name.clone())
        } else {
            incoming.sender_name.clone()
        };

        let (reply_to_message_id, reply_to_preview) =
            self.resolve_reply(incoming.reply_to_external_id.as_deref()).await;

        let new = NewMessage {
            conversation_id: conversation.id.clone(),
            channel_message_id: incoming.channel_message_id.clone(),
            direction: incoming.direction,
            sender_name,
            sender_user_id: None,
            content_type: incoming.content_type,
            content_text: incoming.content_text.clone(),
            content_media_url: incoming.content_media_url.clone(),
            reply_to_message_id,
            reply_to_preview,
            status: if inbound {
                MessageStatus::Delivered
            } else {
                MessageStatus::Sent
            },
            metadata: incoming.metadata.clone(),
            created_at: incoming.timestamp,
        };
        let message = match self.messages.create(new).await {
            Ok(message) => message,
            Err(e) if e.is_duplicate() => {
                debug!(
                    "Lost insert race for {}; treating as duplicate",
                    incoming.channel_message_id
                );
                return Ok(ProcessOutcome::Duplicate);
            }
            Err(e) => return Err(e),
        };

        if inbound {
            self.conversations
                .increment_unread_count(&conversation.id)
                .await?;
        }

        // Late deliveries are recorded but never move the inbox summary back
        let latest = conversation
            .last_message_at
            .is_none_or(|at| incoming.timestamp >= at);
        let latest_inbound = inbound
            && conversation
                .last_inbound_at
                .is_none_or(|at| incoming.timestamp >= at);
        if !latest {
            debug!(
                "Message {} predates the last activity of {}",
                incoming.channel_message_id, conversation.id
            );
        }
        let conversation = self
            .conversations
            .update(
                &conversation.id,
                ConversationUpdate {
                    last_message_at: latest.then_some(incoming.timestamp),
                    last_message_preview: latest
                        .then(|| message_preview(incoming.content_text.as_deref())),
                    last_inbound_at: latest_inbound.then_some(incoming.timestamp),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            "Recorded {} {} message {} in conversation {}",
            event.channel, incoming.direction, message.channel_message_id, conversation.id
        );

        self.notify_new_message(&conversation, &message).await;

        if conversation.channel == Channel::Instagram && conversation.needs_display_name() {
            self.spawn_profile_enrichment(conversation.clone());
        }

        Ok(ProcessOutcome::MessageCreated {
            conversation_id: conversation.id,
            message_id: message.id,
        })
    }

    async fn resolve_tenant(&self, event: &NormalizedWebhookEvent) -> Option<TenantContext> {
        let resolver = self.tenants.as_ref()?;
        let identifier = event
            .channel_account_id
            .as_deref()
            .unwrap_or(&event.contact_identifier);

        match resolver.resolve(event.channel, identifier).await {
            Ok(Some(tenant)) => Some(tenant),
            Ok(None) => {
                warn!("No tenant for {} identifier {}", event.channel, identifier);
                None
            }
            Err(e) => {
                warn!(
                    "Tenant resolution failed for {} identifier {}: {}",
                    event.channel, identifier, e
                );
                None
            }
        }
    }

    async fn upsert_conversation(
        &self,
        event: &NormalizedWebhookEvent,
        incoming: &NormalizedMessage,
        tenant: Option<TenantContext>,
    ) -> Result<Conversation> {
        let existing = self
            .conversations
            .find_by_channel_conversation_id(&event.channel_conversation_id)
            .await?;

        let Some(existing) = existing else {
            let last_inbound_at =
                (incoming.direction == Direction::Inbound).then_some(incoming.timestamp);
            return self.create_conversation(event, tenant, last_inbound_at).await;
        };

        let mut update = ConversationUpdate::default();
        if !existing.has_tenant() {
            update.tenant = tenant;
        }
        if event.channel == Channel::Instagram && existing.needs_display_name() {
            update.contact_name = event
                .contact_name
                .clone()
                .filter(|name| !looks_like_raw_id(name));
        }

        if update.is_empty() {
            return Ok(existing);
        }
        debug!("Backfilling conversation {}", existing.id);
        self.conversations.update(&existing.id, update).await
    }

    /// Create a conversation; a concurrent creator winning the race is not an error
    async fn create_conversation(
        &self,
        event: &NormalizedWebhookEvent,
        tenant: Option<TenantContext>,
        last_inbound_at: Option<DateTime<Utc>>,
    ) -> Result<Conversation> {
        let new = NewConversation {
            channel: event.channel,
            channel_conversation_id: event.channel_conversation_id.clone(),
            contact_identifier: event.contact_identifier.clone(),
            contact_name: event.contact_name.clone(),
            tenant,
            last_inbound_at,
        };

        match self.conversations.create(new).await {
            Ok(conversation) => {
                info!(
                    "Created {} conversation {} for {}",
                    event.channel, conversation.id, event.channel_conversation_id
                );
                Ok(conversation)
            }
            Err(e) if e.is_duplicate() => self
                .conversations
                .find_by_channel_conversation_id(&event.channel_conversation_id)
                .await?
                .ok_or_else(|| {
                    Error::Storage(format!(
                        "conversation {} missing after unique violation",
                        event.channel_conversation_id
                    ))
                }),
            Err(e) => Err(e),
        }
    }

    /// Internal id and preview of the replied-to message; a miss is not an error
    async fn resolve_reply(&self, external_id: Option<&str>) -> (Option<String>, Option<String>) {
        let Some(external_id) = external_id.filter(|id| !id.is_empty()) else {
            return (None, None);
        };

        match self.messages.find_by_channel_message_id(external_id).await {
            Ok(Some(target)) => (
                Some(target.id),
                target.content_text.as_deref().map(truncate_preview),
            ),
            Ok(None) => {
                debug!("Reply target {} not found", external_id);
                (None, None)
            }
            Err(e) => {
                warn!("Reply lookup for {} failed: {}", external_id, e);
                (None, None)
            }
        }
    }

    async fn notify_new_message(&self, conversation: &Conversation, message: &Message) {
        if let Err(e) = self
            .notifications
            .emit_new_message(&conversation.id, message)
            .await
        {
            error!("Failed to emit new message {}: {}", message.id, e);
        }
        if let Err(e) = self.notifications.emit_conversation_update(conversation).await {
            error!("Failed to emit conversation update {}: {}", conversation.id, e);
        }
    }

    async fn notify_status(&self, conversation_id: &str, message_id: &str, status: MessageStatus) {
        if let Err(e) = self
            .notifications
            .emit_message_status_update(conversation_id, message_id, status)
            .await
        {
            error!("Failed to emit status update for {}: {}", message_id, e);
        }
    }

    async fn handle_status_update(
        &self,
        event: &NormalizedWebhookEvent,
        update: &StatusUpdate,
    ) -> Result<ProcessOutcome> {
        if let Some(watermark) = update.watermark {
            return self.apply_watermark(event, update.status, watermark).await;
        }

        if update.message_id.is_empty() {
            debug!("Status update without message id or watermark; ignoring");
            return Ok(ProcessOutcome::Ignored);
        }

        self.messages
            .update_status(&update.message_id, update.status, update.error.clone())
            .await?;

        let Some(message) = self
            .messages
            .find_by_channel_message_id(&update.message_id)
            .await?
        else {
            debug!("Status {} for unknown message {}", update.status, update.message_id);
            return Ok(ProcessOutcome::StatusUpdated { count: 0 });
        };

        debug!("Message {} is now {}", message.id, update.status);
        self.notify_status(&message.conversation_id, &message.id, update.status)
            .await;
        Ok(ProcessOutcome::StatusUpdated { count: 1 })
    }

    /// Apply a status to every outbound message created at or before `watermark` (epoch ms)
    async fn apply_watermark(
        &self,
        event: &NormalizedWebhookEvent,
        status: MessageStatus,
        watermark: i64,
    ) -> Result<ProcessOutcome> {
        let Some(conversation) = self
            .conversations
            .find_by_channel_conversation_id(&event.channel_conversation_id)
            .await?
        else {
            warn!(
                "Watermark for unknown conversation {}",
                event.channel_conversation_id
            );
            return Ok(ProcessOutcome::StatusUpdated { count: 0 });
        };

        let Some(cutoff) = DateTime::from_timestamp_millis(watermark) else {
            warn!("Watermark {} out of range", watermark);
            return Ok(ProcessOutcome::Ignored);
        };

        let candidates = match self
            .conversations
            .find_outbound_before_timestamp(&conversation.id, cutoff)
            .await
        {
            Ok(messages) => messages,
            Err(Error::CapabilityMissing(operation)) => {
                warn!(
                    "Conversation repository lacks {}; dropping watermark for {}",
                    operation, conversation.id
                );
                return Ok(ProcessOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        let mut count = 0;
        for message in candidates.iter().filter(|m| m.status != status) {
            self.messages
                .update_status(&message.channel_message_id, status, None)
                .await?;
            self.notify_status(&conversation.id, &message.id, status).await;
            count += 1;
        }

        debug!(
            "Watermark {} marked {} messages {} in {}",
            watermark, count, status, conversation.id
        );
        Ok(ProcessOutcome::StatusUpdated { count })
    }

    async fn handle_conversation_created(
        &self,
        event: &NormalizedWebhookEvent,
    ) -> Result<ProcessOutcome> {
        if let Some(existing) = self
            .conversations
            .find_by_channel_conversation_id(&event.channel_conversation_id)
            .await?
        {
            return Ok(ProcessOutcome::ConversationExists {
                conversation_id: existing.id,
            });
        }

        let tenant = self.resolve_tenant(event).await;
        let conversation = self.create_conversation(event, tenant, None).await?;
        Ok(ProcessOutcome::ConversationSeeded {
            conversation_id: conversation.id,
        })
    }

    /// Look up the contact's profile in the background and fill in the name
    fn spawn_profile_enrichment(&self, conversation: Conversation) {
        let Some(adapter) = self.adapters.get(conversation.channel) else {
            debug!("No {} adapter for profile enrichment", conversation.channel);
            return;
        };

        let enricher = ProfileEnricher {
            adapter,
            conversations: self.conversations.clone(),
            notifications: self.notifications.clone(),
            credentials: self.credentials.clone(),
            profiles: self.profiles.clone(),
        };

        tokio::spawn(async move {
            let conversation_id = conversation.id.clone();
            if let Err(e) = enricher.run(conversation).await {
                warn!("Profile enrichment failed for {}: {}", conversation_id, e);
            }
        });
    }
}

struct ProfileEnricher {
    adapter: Arc<dyn ChannelAdapter>,
    conversations: Arc<dyn ConversationRepository>,
    notifications: Arc<dyn NotificationSink>,
    credentials: Option<Arc<dyn CredentialsResolver>>,
    profiles: Option<Arc<dyn ContactProfileStore>>,
}

impl ProfileEnricher {
    async fn run(self, conversation: Conversation) -> Result<()> {
        let credentials = match (&self.credentials, &conversation.channel_config_id) {
            (Some(resolver), Some(config_id)) => resolver.resolve(config_id).await,
            _ => None,
        };

        let Some(profile) = self
            .adapter
            .fetch_user_profile(&conversation.contact_identifier, credentials.as_ref())
            .await
        else {
            debug!("No profile for {}", conversation.contact_identifier);
            return Ok(());
        };

        if let Some(name) = profile.display_name() {
            let updated = self
                .conversations
                .update(
                    &conversation.id,
                    ConversationUpdate {
                        contact_name: Some(name),
                        ..Default::default()
                    },
                )
                .await?;
            if let Err(e) = self.notifications.emit_conversation_update(&updated).await {
                error!("Failed to emit conversation update {}: {}", updated.id, e);
            }
        }

        if let Some(profiles) = &self.profiles {
            match profiles
                .find_by_channel_identifier(conversation.channel, &conversation.contact_identifier)
                .await?
            {
                Some(existing) => {
                    profiles
                        .update(&existing.id, profile.display_name(), profile.avatar_url.clone())
                        .await?;
                }
                None => {
                    profiles
                        .create(
                            conversation.channel,
                            &conversation.contact_identifier,
                            profile.display_name(),
                            profile.avatar_url.clone(),
                        )
                        .await?;
                }
            }
        }

        Ok(())
    }
}
