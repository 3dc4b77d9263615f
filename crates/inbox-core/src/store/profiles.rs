//! Contact-channel profile store on SQLite

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use super::{SqliteStore, from_millis, insert_error, parse_text, to_millis};
use crate::repository::ContactProfileStore;
use crate::types::{Channel, ContactChannelProfile};
use crate::{Error, Result};

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<ContactChannelProfile> {
    let channel: String = row.get(1)?;
    Ok(ContactChannelProfile {
        id: row.get(0)?,
        channel: parse_text(1, &channel)?,
        contact_identifier: row.get(2)?,
        display_name: row.get(3)?,
        avatar_url: row.get(4)?,
        updated_at: from_millis(5, row.get(5)?)?,
    })
}

impl SqliteStore {
    fn load_profile(&self, id: &str) -> Result<ContactChannelProfile> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, channel, contact_identifier, display_name, avatar_url, updated_at
             FROM contact_channel_profiles WHERE id = ?1",
            params![id],
            row_to_profile,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("contact profile {}", id)))
    }
}

#[async_trait]
impl ContactProfileStore for SqliteStore {
    async fn find_by_channel_identifier(
        &self,
        channel: Channel,
        contact_identifier: &str,
    ) -> Result<Option<ContactChannelProfile>> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                "SELECT id, channel, contact_identifier, display_name, avatar_url, updated_at
                 FROM contact_channel_profiles WHERE channel = ?1 AND contact_identifier = ?2",
                params![channel.as_str(), contact_identifier],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    async fn create(
        &self,
        channel: Channel,
        contact_identifier: &str,
        display_name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<ContactChannelProfile> {
        let id = uuid::Uuid::new_v4().to_string();
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO contact_channel_profiles
                    (id, channel, contact_identifier, display_name, avatar_url, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    channel.as_str(),
                    contact_identifier,
                    display_name,
                    avatar_url,
                    to_millis(Utc::now()),
                ],
            )
            .map_err(|e| insert_error(e, contact_identifier))?;
        }
        self.load_profile(&id)
    }

    async fn update(
        &self,
        id: &str,
        display_name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<ContactChannelProfile> {
        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE contact_channel_profiles SET
                    display_name = COALESCE(?2, display_name),
                    avatar_url = COALESCE(?3, avatar_url),
                    updated_at = ?4
                 WHERE id = ?1",
                params![id, display_name, avatar_url, to_millis(Utc::now())],
            )?;
        }
        self.load_profile(id)
    }
}
