//! Conversation repository on SQLite

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use super::{SqliteStore, from_millis, from_millis_opt, insert_error, parse_json, parse_text, to_millis};
use crate::repository::ConversationRepository;
use crate::types::{Conversation, ConversationStatus, ConversationUpdate, Message, NewConversation};
use crate::{Error, Result};

const CONVERSATION_COLUMNS: &str = "id, channel, channel_conversation_id, contact_identifier, \
     contact_name, status, tags, assigned_user_id, unread_count, last_message_at, \
     last_message_preview, last_inbound_at, clinic_id, region_id, channel_config_id, \
     metadata, created_at, updated_at";

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let channel: String = row.get(1)?;
    let status: String = row.get(5)?;
    let tags: String = row.get(6)?;
    let metadata: String = row.get(15)?;
    let unread: i64 = row.get(8)?;

    Ok(Conversation {
        id: row.get(0)?,
        channel: parse_text(1, &channel)?,
        channel_conversation_id: row.get(2)?,
        contact_identifier: row.get(3)?,
        contact_name: row.get(4)?,
        status: parse_text(5, &status)?,
        tags: parse_json(6, &tags)?,
        assigned_user_id: row.get(7)?,
        unread_count: u32::try_from(unread).unwrap_or(0),
        last_message_at: from_millis_opt(9, row.get(9)?)?,
        last_message_preview: row.get(10)?,
        last_inbound_at: from_millis_opt(11, row.get(11)?)?,
        clinic_id: row.get(12)?,
        region_id: row.get(13)?,
        channel_config_id: row.get(14)?,
        metadata: parse_json(15, &metadata)?,
        created_at: from_millis(16, row.get(16)?)?,
        updated_at: from_millis(17, row.get(17)?)?,
    })
}

impl SqliteStore {
    fn load_conversation(&self, sql_filter: &str, value: &str) -> Result<Option<Conversation>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM conversations WHERE {} = ?1",
            CONVERSATION_COLUMNS, sql_filter
        );
        let conversation = conn
            .query_row(&sql, params![value], row_to_conversation)
            .optional()?;
        Ok(conversation)
    }

    fn require_conversation(&self, id: &str) -> Result<Conversation> {
        self.load_conversation("id", id)?
            .ok_or_else(|| Error::NotFound(format!("conversation {}", id)))
    }
}

#[async_trait]
impl ConversationRepository for SqliteStore {
    async fn find_by_channel_conversation_id(
        &self,
        channel_conversation_id: &str,
    ) -> Result<Option<Conversation>> {
        self.load_conversation("channel_conversation_id", channel_conversation_id)
    }

    async fn find_one(&self, id: &str) -> Result<Option<Conversation>> {
        self.load_conversation("id", id)
    }

    async fn create(&self, new: NewConversation) -> Result<Conversation> {
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let (clinic_id, region_id, channel_config_id) = match new.tenant {
            Some(t) => (Some(t.clinic_id), t.region_id, t.channel_config_id),
            None => (None, None, None),
        };

        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO conversations (id, channel, channel_conversation_id, contact_identifier,
                    contact_name, status, tags, unread_count, last_inbound_at, clinic_id, region_id,
                    channel_config_id, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, '[]', 0, ?7, ?8, ?9, ?10, '{}', ?11, ?11)",
                params![
                    id,
                    new.channel.as_str(),
                    new.channel_conversation_id,
                    new.contact_identifier,
                    new.contact_name,
                    ConversationStatus::Open.as_str(),
                    new.last_inbound_at.map(to_millis),
                    clinic_id,
                    region_id,
                    channel_config_id,
                    to_millis(now),
                ],
            )
            .map_err(|e| insert_error(e, &new.channel_conversation_id))?;
        }

        debug!(
            "Created conversation {} for {}",
            id, new.channel_conversation_id
        );
        self.require_conversation(&id)
    }

    async fn update(&self, id: &str, update: ConversationUpdate) -> Result<Conversation> {
        let (clinic_id, region_id, channel_config_id) = match update.tenant {
            Some(t) => (Some(t.clinic_id), t.region_id, t.channel_config_id),
            None => (None, None, None),
        };

        let affected = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE conversations SET
                    contact_name = COALESCE(?2, contact_name),
                    status = COALESCE(?3, status),
                    last_message_at = COALESCE(?4, last_message_at),
                    last_message_preview = COALESCE(?5, last_message_preview),
                    last_inbound_at = COALESCE(?6, last_inbound_at),
                    clinic_id = COALESCE(?7, clinic_id),
                    region_id = CASE WHEN ?7 IS NULL THEN region_id ELSE ?8 END,
                    channel_config_id = CASE WHEN ?7 IS NULL THEN channel_config_id ELSE ?9 END,
                    updated_at = ?10
                 WHERE id = ?1",
                params![
                    id,
                    update.contact_name,
                    update.status.map(|s| s.as_str()),
                    update.last_message_at.map(to_millis),
                    update.last_message_preview,
                    update.last_inbound_at.map(to_millis),
                    clinic_id,
                    region_id,
                    channel_config_id,
                    to_millis(Utc::now()),
                ],
            )?
        };

        if affected == 0 {
            return Err(Error::NotFound(format!("conversation {}", id)));
        }
        self.require_conversation(id)
    }

    async fn increment_unread_count(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE conversations SET unread_count = unread_count + 1 WHERE id = ?1",
            params![id],
        )?;
        if affected == 0 {
            return Err(Error::NotFound(format!("conversation {}", id)));
        }
        Ok(())
    }

    async fn mark_read(&self, id: &str) -> Result<Conversation> {
        let affected = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE conversations SET unread_count = 0, updated_at = ?2 WHERE id = ?1",
                params![id, to_millis(Utc::now())],
            )?
        };
        if affected == 0 {
            return Err(Error::NotFound(format!("conversation {}", id)));
        }
        self.require_conversation(id)
    }

    async fn find_outbound_before_timestamp(
        &self,
        conversation_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        self.query_messages(
            "conversation_id = ?1 AND direction = 'outbound' AND created_at <= ?2
             ORDER BY created_at ASC",
            params![conversation_id, to_millis(timestamp)],
        )
    }
}
