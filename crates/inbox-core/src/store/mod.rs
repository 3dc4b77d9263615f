//! SQLite persistence for conversations, messages and contact profiles
//!
//! Implements the repository traits from [`crate::repository`]. Uniqueness of
//! `channel_conversation_id` and `channel_message_id` is enforced by the
//! schema; violations surface as [`Error::Duplicate`].

mod conversations;
mod messages;
mod profiles;

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;
use tracing::{debug, info};

use crate::{Error, Result};

/// SQLite-backed store shared by all repositories
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`
    pub fn new(db_path: &str) -> Result<Self> {
        debug!("Opening inbox database at: {}", db_path);
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Storage(format!("cannot create {}: {}", parent.display(), e)))?;
            }
        }
        let conn = Connection::open(db_path)?;
        let store = Self::from_connection(conn)?;
        info!("SqliteStore initialized at {}", db_path);
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_tables()?;
        Ok(store)
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                channel TEXT NOT NULL,
                channel_conversation_id TEXT NOT NULL UNIQUE,
                contact_identifier TEXT NOT NULL,
                contact_name TEXT,
                status TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                assigned_user_id TEXT,
                unread_count INTEGER NOT NULL DEFAULT 0,
                last_message_at INTEGER,
                last_message_preview TEXT,
                last_inbound_at INTEGER,
                clinic_id TEXT,
                region_id TEXT,
                channel_config_id TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                channel_message_id TEXT NOT NULL UNIQUE,
                direction TEXT NOT NULL,
                sender_name TEXT,
                sender_user_id TEXT,
                content_type TEXT NOT NULL,
                content_text TEXT,
                content_media_url TEXT,
                reply_to_message_id TEXT,
                reply_to_preview TEXT,
                status TEXT NOT NULL,
                metadata TEXT NOT NULL,
                error TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, created_at);

            CREATE TABLE IF NOT EXISTS contact_channel_profiles (
                id TEXT PRIMARY KEY,
                channel TEXT NOT NULL,
                contact_identifier TEXT NOT NULL,
                display_name TEXT,
                avatar_url TEXT,
                updated_at INTEGER NOT NULL,
                UNIQUE(channel, contact_identifier)
            );",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("database connection lock poisoned".to_string()))
    }
}

/// Map an insert failure, turning unique-constraint violations into `Duplicate`
fn insert_error(err: rusqlite::Error, key: &str) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            Error::Duplicate(key.to_string())
        }
        _ => Error::Database(err),
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            Box::new(Error::Storage(format!("timestamp out of range: {}", ms))),
        )
    })
}

fn from_millis_opt(idx: usize, ms: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    ms.map(|ms| from_millis(idx, ms)).transpose()
}

fn parse_text<T: FromStr<Err = Error>>(idx: usize, text: &str) -> rusqlite::Result<T> {
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
