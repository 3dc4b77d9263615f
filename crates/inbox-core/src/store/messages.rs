//! Message repository on SQLite

use async_trait::async_trait;
use rusqlite::{OptionalExtension, Params, Row, params};
use tracing::debug;

use super::{SqliteStore, from_millis, insert_error, parse_json, parse_text, to_millis};
use crate::repository::MessageRepository;
use crate::types::{DeliveryError, Message, MessageStatus, NewMessage};
use crate::{Error, Result};

const MESSAGE_COLUMNS: &str = "id, conversation_id, channel_message_id, direction, sender_name, \
     sender_user_id, content_type, content_text, content_media_url, reply_to_message_id, \
     reply_to_preview, status, metadata, error, created_at";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let direction: String = row.get(3)?;
    let content_type: String = row.get(6)?;
    let status: String = row.get(11)?;
    let metadata: String = row.get(12)?;
    let error: Option<String> = row.get(13)?;

    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        channel_message_id: row.get(2)?,
        direction: parse_text(3, &direction)?,
        sender_name: row.get(4)?,
        sender_user_id: row.get(5)?,
        content_type: parse_text(6, &content_type)?,
        content_text: row.get(7)?,
        content_media_url: row.get(8)?,
        reply_to_message_id: row.get(9)?,
        reply_to_preview: row.get(10)?,
        status: parse_text(11, &status)?,
        metadata: parse_json(12, &metadata)?,
        error: error.as_deref().map(|e| parse_json(13, e)).transpose()?,
        created_at: from_millis(14, row.get(14)?)?,
    })
}

impl SqliteStore {
    pub(super) fn query_messages<P: Params>(&self, filter: &str, params: P) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM messages WHERE {}", MESSAGE_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, row_to_message)?;

        let mut result = Vec::new();
        for message in rows {
            result.push(message?);
        }
        Ok(result)
    }

    fn load_message(&self, column: &str, value: &str) -> Result<Option<Message>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM messages WHERE {} = ?1", MESSAGE_COLUMNS, column);
        let message = conn
            .query_row(&sql, params![value], row_to_message)
            .optional()?;
        Ok(message)
    }
}

#[async_trait]
impl MessageRepository for SqliteStore {
    async fn find_by_channel_message_id(&self, channel_message_id: &str) -> Result<Option<Message>> {
        self.load_message("channel_message_id", channel_message_id)
    }

    async fn find_one(&self, id: &str) -> Result<Option<Message>> {
        self.load_message("id", id)
    }

    async fn create(&self, new: NewMessage) -> Result<Message> {
        let id = uuid::Uuid::new_v4().to_string();
        let metadata = serde_json::to_string(&new.metadata)?;

        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO messages (id, conversation_id, channel_message_id, direction, sender_name,
                    sender_user_id, content_type, content_text, content_media_url, reply_to_message_id,
                    reply_to_preview, status, metadata, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, NULL, ?14)",
                params![
                    id,
                    new.conversation_id,
                    new.channel_message_id,
                    new.direction.as_str(),
                    new.sender_name,
                    new.sender_user_id,
                    new.content_type.as_str(),
                    new.content_text,
                    new.content_media_url,
                    new.reply_to_message_id,
                    new.reply_to_preview,
                    new.status.as_str(),
                    metadata,
                    to_millis(new.created_at),
                ],
            )
            .map_err(|e| insert_error(e, &new.channel_message_id))?;
        }

        debug!("Stored message {} ({})", id, new.channel_message_id);
        self.load_message("id", &id)?
            .ok_or_else(|| Error::Storage(format!("message {} vanished after insert", id)))
    }

    async fn update_status(
        &self,
        channel_message_id: &str,
        status: MessageStatus,
        error: Option<DeliveryError>,
    ) -> Result<usize> {
        let error = error.map(|e| serde_json::to_string(&e)).transpose()?;
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE messages SET status = ?2, error = ?3 WHERE channel_message_id = ?1",
            params![channel_message_id, status.as_str(), error],
        )?;
        Ok(affected)
    }

    async fn record_resend(&self, id: &str, channel_message_id: &str) -> Result<Message> {
        let affected = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE messages SET channel_message_id = ?2, status = ?3, error = NULL WHERE id = ?1",
                params![id, channel_message_id, MessageStatus::Sent.as_str()],
            )
            .map_err(|e| insert_error(e, channel_message_id))?
        };
        if affected == 0 {
            return Err(Error::NotFound(format!("message {}", id)));
        }
        self.load_message("id", id)?
            .ok_or_else(|| Error::NotFound(format!("message {}", id)))
    }

    async fn list_by_conversation(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_messages(
            "conversation_id = ?1 ORDER BY created_at ASC LIMIT ?2",
            params![conversation_id, limit],
        )
    }
}
