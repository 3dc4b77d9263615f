//! Outbound send path
//!
//! Staff replies go through [`OutboundService`]: the message is sent through the
//! conversation's channel adapter first and only recorded once the provider
//! accepted it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use inbox_core::adapter::{
    AdapterRegistry, ChannelAdapter, ChannelCredentials, OutboundContent, SendResult,
};
use inbox_core::repository::{
    ConversationRepository, CredentialsResolver, MessageRepository, NotificationSink,
};
use inbox_core::types::{
    ContentType, Conversation, ConversationUpdate, DeliveryError, Direction, Message,
    MessageMetadata, MessageStatus, NewMessage, TemplateMeta, message_preview, truncate_preview,
};
use inbox_core::{Error, Result};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

fn default_content_type() -> ContentType {
    ContentType::Text
}

/// A message composed by a staff member
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComposeRequest {
    #[serde(default = "default_content_type")]
    pub content_type: ContentType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub template_variables: BTreeMap<String, String>,
    /// Internal id of the message being replied to
    #[serde(default)]
    pub reply_to_message_id: Option<String>,
    #[serde(default)]
    pub sender_user_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
}

impl ComposeRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Text,
            text: Some(text.into()),
            media_url: None,
            template_id: None,
            template_variables: BTreeMap::new(),
            reply_to_message_id: None,
            sender_user_id: None,
            sender_name: None,
        }
    }

    fn template_id(&self) -> Option<&str> {
        self.template_id.as_deref().filter(|id| !id.is_empty())
    }

    fn validate(&self) -> Result<()> {
        if self.template_id().is_some() {
            return Ok(());
        }
        match self.content_type {
            ContentType::Text => {
                if self.text.as_deref().is_none_or(|t| t.trim().is_empty()) {
                    return Err(Error::BadRequest("text message requires text".to_string()));
                }
            }
            ContentType::Template => {
                return Err(Error::BadRequest(
                    "template message requires a template id".to_string(),
                ));
            }
            _ => {
                if self.media_url.as_deref().is_none_or(str::is_empty) {
                    return Err(Error::BadRequest(format!(
                        "{} message requires a media url",
                        self.content_type
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Sends staff messages and records them once accepted
#[derive(Clone)]
pub struct OutboundService {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    notifications: Arc<dyn NotificationSink>,
    adapters: AdapterRegistry,
    credentials: Option<Arc<dyn CredentialsResolver>>,
}

impl OutboundService {
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
            credentials: None,
        }
    }

    pub fn with_credentials_resolver(mut self, resolver: Arc<dyn CredentialsResolver>) -> Self {
        self.credentials = Some(resolver);
        self
    }

    /// Send a message into a conversation and record it
    pub async fn send(&self, conversation_id: &str, request: ComposeRequest) -> Result<Message> {
        request.validate()?;

        let conversation = self
            .conversations
            .find_one(conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {}", conversation_id)))?;

        let adapter = self.adapter_for(&conversation)?;
        let credentials = self.credentials_for(&conversation).await;
        let reply = self.reply_target(request.reply_to_message_id.as_deref()).await;

        let result = match request.template_id() {
            Some(template_id) => {
                adapter
                    .send_template_message(
                        &conversation.contact_identifier,
                        template_id,
                        &request.template_variables,
                        credentials.as_ref(),
                    )
                    .await
            }
            None => {
                let content = OutboundContent {
                    content_type: request.content_type,
                    text: request.text.clone(),
                    media_url: request.media_url.clone(),
                    reply_to: reply.as_ref().map(|m| m.channel_message_id.clone()),
                };
                adapter
                    .send_message(&conversation.contact_identifier, &content, credentials.as_ref())
                    .await
            }
        };

        let channel_message_id = accepted_id(result)?;
        let now = Utc::now();

        let (content_type, metadata) = match request.template_id() {
            Some(template_id) => (
                ContentType::Template,
                MessageMetadata::Template(TemplateMeta {
                    template_id: template_id.to_string(),
                    variables: request.template_variables.clone(),
                }),
            ),
            None => (request.content_type, MessageMetadata::None),
        };

        let message = self
            .messages
            .create(NewMessage {
                conversation_id: conversation.id.clone(),
                channel_message_id,
                direction: Direction::Outbound,
                sender_name: request.sender_name,
                sender_user_id: request.sender_user_id,
                content_type,
                content_text: request.text,
                content_media_url: request.media_url,
                reply_to_message_id: reply.as_ref().map(|m| m.id.clone()),
                reply_to_preview: reply
                    .as_ref()
                    .and_then(|m| m.content_text.as_deref())
                    .map(truncate_preview),
                status: MessageStatus::Sent,
                metadata,
                created_at: now,
            })
            .await?;

        let conversation = self
            .conversations
            .update(
                &conversation.id,
                ConversationUpdate {
                    last_message_at: Some(now),
                    last_message_preview: Some(message_preview(message.content_text.as_deref())),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            "Sent {} message {} in conversation {}",
            conversation.channel, message.channel_message_id, conversation.id
        );

        if let Err(e) = self
            .notifications
            .emit_new_message(&conversation.id, &message)
            .await
        {
            error!("Failed to emit new message {}: {}", message.id, e);
        }
        if let Err(e) = self.notifications.emit_conversation_update(&conversation).await {
            error!("Failed to emit conversation update {}: {}", conversation.id, e);
        }

        Ok(message)
    }

    /// Re-send a failed outbound message, keeping its row
    pub async fn resend(&self, message_id: &str) -> Result<Message> {
        let message = self
            .messages
            .find_one(message_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("message {}", message_id)))?;

        if message.direction != Direction::Outbound {
            return Err(Error::BadRequest("only outbound messages can be re-sent".to_string()));
        }
        if message.status != MessageStatus::Failed {
            return Err(Error::BadRequest(format!(
                "message {} is {}, not failed",
                message.id, message.status
            )));
        }

        let conversation = self
            .conversations
            .find_one(&message.conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {}", message.conversation_id)))?;
        let adapter = self.adapter_for(&conversation)?;
        let credentials = self.credentials_for(&conversation).await;

        let result = match &message.metadata {
            MessageMetadata::Template(template) => {
                adapter
                    .send_template_message(
                        &conversation.contact_identifier,
                        &template.template_id,
                        &template.variables,
                        credentials.as_ref(),
                    )
                    .await
            }
            _ => {
                let reply_to = self.reply_target(message.reply_to_message_id.as_deref()).await;
                let content = OutboundContent {
                    content_type: message.content_type,
                    text: message.content_text.clone(),
                    media_url: message.content_media_url.clone(),
                    reply_to: reply_to.map(|m| m.channel_message_id),
                };
                adapter
                    .send_message(&conversation.contact_identifier, &content, credentials.as_ref())
                    .await
            }
        };

        if !result.success {
            let reason = result.error.unwrap_or_else(|| "send failed".to_string());
            let delivery_error = DeliveryError {
                code: None,
                message: Some(reason.clone()),
            };
            if let Err(e) = self
                .messages
                .update_status(
                    &message.channel_message_id,
                    MessageStatus::Failed,
                    Some(delivery_error),
                )
                .await
            {
                warn!("Failed to record resend error for {}: {}", message.id, e);
            }
            return Err(Error::Send(reason));
        }
        let channel_message_id = accepted_id(result)?;

        let message = self
            .messages
            .record_resend(&message.id, &channel_message_id)
            .await?;
        info!("Re-sent message {} as {}", message.id, channel_message_id);

        if let Err(e) = self
            .notifications
            .emit_message_status_update(&message.conversation_id, &message.id, MessageStatus::Sent)
            .await
        {
            error!("Failed to emit status update for {}: {}", message.id, e);
        }

        Ok(message)
    }

    fn adapter_for(&self, conversation: &Conversation) -> Result<Arc<dyn ChannelAdapter>> {
        self.adapters.get(conversation.channel).ok_or_else(|| {
            Error::Config(format!("no adapter configured for {}", conversation.channel))
        })
    }

    async fn credentials_for(&self, conversation: &Conversation) -> Option<ChannelCredentials> {
        let resolver = self.credentials.as_ref()?;
        let config_id = conversation.channel_config_id.as_deref()?;
        let credentials = resolver.resolve(config_id).await;
        if credentials.is_none() {
            debug!("No credentials for channel config {}", config_id);
        }
        credentials
    }

    async fn reply_target(&self, message_id: Option<&str>) -> Option<Message> {
        let message_id = message_id.filter(|id| !id.is_empty())?;
        match self.messages.find_one(message_id).await {
            Ok(Some(message)) => Some(message),
            Ok(None) => {
                debug!("Reply target {} not found", message_id);
                None
            }
            Err(e) => {
                warn!("Reply lookup for {} failed: {}", message_id, e);
                None
            }
        }
    }
}

/// Provider message id of an accepted send, or a local placeholder
fn accepted_id(result: SendResult) -> Result<String> {
    if !result.success {
        return Err(Error::Send(
            result.error.unwrap_or_else(|| "send failed".to_string()),
        ));
    }
    Ok(result
        .channel_message_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(local_message_id))
}

/// Stand-in id for providers that accept a send without returning one
fn local_message_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("local-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}
