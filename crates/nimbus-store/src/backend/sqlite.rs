use async_trait::async_trait;
use nimbus_core::{ConversationRecord, Message, Sender};
use rusqlite::{params, OptionalExtension};

use super::{DocumentBackend, DocumentKey};
use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers::{get, get_opt, parse_enum, parse_json, parse_timestamp};

const TABLE: &str = "conversations";

/// Durable backend over the local SQLite database.
///
/// rusqlite is blocking, so every call runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteBackend {
    db: Database,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl DocumentBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &DocumentKey) -> Result<Option<ConversationRecord>, StoreError> {
        let db = self.db.clone();
        let key = key.clone();
        tokio::task::spawn_blocking(move || db.with_conn(|conn| read_record(conn, &key))).await?
    }

    async fn put(&self, key: &DocumentKey, record: &ConversationRecord) -> Result<(), StoreError> {
        let db = self.db.clone();
        let key = key.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || db.with_conn(|conn| write_record(conn, &key, &record)))
            .await?
    }
}

fn read_record(
    conn: &rusqlite::Connection,
    key: &DocumentKey,
) -> Result<Option<ConversationRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT user_id, session_id, messages, last_message_text, last_message_sender,
                message_count, last_message_at, timestamp
         FROM conversations
         WHERE collection = ?1 AND user_id = ?2 AND session_id = ?3",
    )?;
    let row = stmt
        .query_row(
            params![key.collection(), key.user_id(), key.session_id()],
            |row| Ok(row_to_record(row)),
        )
        .optional()?;
    row.transpose()
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<ConversationRecord, StoreError> {
    let messages_raw: String = get(row, 2, TABLE, "messages")?;
    let messages: Vec<Message> = parse_json(&messages_raw, TABLE, "messages")?;
    let sender_raw: Option<String> = get_opt(row, 4, TABLE, "last_message_sender")?;
    let last_message_sender = sender_raw
        .map(|s| parse_enum::<Sender>(&s, TABLE, "last_message_sender"))
        .transpose()?;
    let message_count: i64 = get(row, 5, TABLE, "message_count")?;
    let last_message_at: String = get(row, 6, TABLE, "last_message_at")?;
    let timestamp: String = get(row, 7, TABLE, "timestamp")?;

    Ok(ConversationRecord {
        user_id: get(row, 0, TABLE, "user_id")?,
        session_id: get(row, 1, TABLE, "session_id")?,
        messages,
        last_message_text: get(row, 3, TABLE, "last_message_text")?,
        last_message_sender,
        message_count: usize::try_from(message_count).map_err(|_| StoreError::CorruptRow {
            table: TABLE,
            column: "message_count",
            detail: format!("negative count {message_count}"),
        })?,
        last_message_at: parse_timestamp(&last_message_at, TABLE, "last_message_at")?,
        timestamp: parse_timestamp(&timestamp, TABLE, "timestamp")?,
    })
}

fn write_record(
    conn: &rusqlite::Connection,
    key: &DocumentKey,
    record: &ConversationRecord,
) -> Result<(), StoreError> {
    let messages = serde_json::to_string(&record.messages)?;
    let _ = conn.execute(
        "INSERT INTO conversations
            (collection, user_id, session_id, messages, last_message_text,
             last_message_sender, message_count, last_message_at, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (collection, user_id, session_id) DO UPDATE SET
            messages = excluded.messages,
            last_message_text = excluded.last_message_text,
            last_message_sender = excluded.last_message_sender,
            message_count = excluded.message_count,
            last_message_at = excluded.last_message_at,
            timestamp = excluded.timestamp",
        params![
            key.collection(),
            key.user_id(),
            key.session_id(),
            messages,
            record.last_message_text,
            record.last_message_sender.map(|s| s.as_str()),
            record.message_count as i64,
            record.last_message_at.to_rfc3339(),
            record.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(())
}
