//! Notification sink that writes live updates to the log

use async_trait::async_trait;
use inbox_core::repository::NotificationSink;
use inbox_core::types::{Conversation, Message, MessageStatus};
use inbox_core::Result;
use tracing::info;

/// Logs every notification; stands in for a realtime broadcaster
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn emit_new_message(&self, conversation_id: &str, message: &Message) -> Result<()> {
        info!(
            conversation_id,
            message_id = %message.id,
            direction = %message.direction,
            "new message"
        );
        Ok(())
    }

    async fn emit_conversation_update(&self, conversation: &Conversation) -> Result<()> {
        info!(
            conversation_id = %conversation.id,
            unread_count = conversation.unread_count,
            "conversation updated"
        );
        Ok(())
    }

    async fn emit_message_status_update(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<()> {
        info!(conversation_id, message_id, status = %status, "message status updated");
        Ok(())
    }
}
