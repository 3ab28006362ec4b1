use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::{RelayError, RelayResult};

/// A persisted chat message.
///
/// Only `readers` ever changes after creation, and only by growing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub room_id: String,
    #[serde(rename = "sender")]
    pub sender_id: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Users who have read the message, in the order they read it.
    #[serde(rename = "readBy")]
    pub readers: Vec<String>,
    #[serde(rename = "info")]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub room_id: String,
    pub sender_id: String,
    pub body: String,
    pub metadata: Value,
}

impl NewMessage {
    pub fn validate(&self) -> RelayResult<()> {
        require("roomId", &self.room_id)?;
        require("sender", &self.sender_id)?;
        require("message", &self.body)
    }
}

pub(crate) fn require(field: &str, value: &str) -> RelayResult<()> {
    if value.trim().is_empty() {
        return Err(RelayError::Validation(format!("{field} is required")));
    }
    Ok(())
}

type MessageRow = (String, String, String, String, i64, String);

fn decode(row: MessageRow, readers: &mut HashMap<String, Vec<String>>) -> RelayResult<Message> {
    let (id, room_id, sender_id, body, created_at, metadata) = row;
    Ok(Message {
        id: Uuid::parse_str(&id)?,
        readers: readers.remove(&id).unwrap_or_default(),
        room_id,
        sender_id,
        body,
        created_at: OffsetDateTime::from_unix_timestamp_nanos(created_at.into())?,
        metadata: serde_json::from_str(&metadata)?,
    })
}

fn group_readers(rows: Vec<(String, String)>) -> HashMap<String, Vec<String>> {
    let mut readers: HashMap<String, Vec<String>> = HashMap::new();
    for (message_id, user_id) in rows {
        readers.entry(message_id).or_default().push(user_id);
    }
    readers
}

/// Durable message log backed by SQLite.
///
/// Every mutation is a single statement touching individual rows, so
/// concurrent appends and mark-reads on the same room never overwrite each
/// other.
#[derive(Clone)]
pub struct MessageStore {
    db_pool: SqlitePool,
}

impl MessageStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db_pool
    }

    /// Persists a new message. Returns only once the row is written.
    pub async fn append(&self, new: NewMessage) -> RelayResult<Message> {
        new.validate()?;

        let id = Uuid::now_v7();
        let created_at = OffsetDateTime::now_utc();
        let nanos = i64::try_from(created_at.unix_timestamp_nanos())
            .map_err(|_| RelayError::Malformed(format!("timestamp {created_at} out of range")))?;

        sqlx::query("INSERT INTO messages (id,room_id,room_key,sender_id,body,created_at,metadata) VALUES (?,?,?,?,?,?,?)")
            .bind(id.to_string())
            .bind(&new.room_id)
            .bind(new.room_id.to_lowercase())
            .bind(&new.sender_id)
            .bind(&new.body)
            .bind(nanos)
            .bind(new.metadata.to_string())
            .execute(&self.db_pool)
            .await?;

        debug!(%id, room_id = %new.room_id, "message stored");

        Ok(Message {
            id,
            room_id: new.room_id,
            sender_id: new.sender_id,
            body: new.body,
            created_at,
            readers: Vec::new(),
            metadata: new.metadata,
        })
    }

    /// All messages of a room, newest first. Equal timestamps keep the most
    /// recently appended first.
    pub async fn history(&self, room_id: &str) -> RelayResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id,room_id,sender_id,body,created_at,metadata FROM messages
             WHERE room_id=?
             ORDER BY created_at DESC, seq DESC",
        )
        .bind(room_id)
        .fetch_all(&self.db_pool)
        .await?;

        let reader_rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT r.message_id,r.user_id FROM message_readers r
             JOIN messages m ON m.id = r.message_id
             WHERE m.room_id=?
             ORDER BY r.seq",
        )
        .bind(room_id)
        .fetch_all(&self.db_pool)
        .await?;

        let mut readers = group_readers(reader_rows);
        rows.into_iter().map(|row| decode(row, &mut readers)).collect()
    }

    /// Adds `user_id` to the readers of every message in the room that does
    /// not have it yet. Returns the ids of the messages that changed.
    ///
    /// One `INSERT OR IGNORE` covers the whole room: each affected message
    /// gains a reader row, nothing is read back and rewritten.
    pub async fn mark_read(&self, room_id: &str, user_id: &str) -> RelayResult<Vec<Uuid>> {
        require("roomId", room_id)?;
        require("userId", user_id)?;

        let rows: Vec<(String,)> = sqlx::query_as(
            "INSERT OR IGNORE INTO message_readers (message_id,user_id)
             SELECT m.id, ?1 FROM messages m
             WHERE m.room_id = ?2
               AND NOT EXISTS (
                   SELECT 1 FROM message_readers r WHERE r.message_id = m.id AND r.user_id = ?1
               )
             RETURNING message_id",
        )
        .bind(user_id)
        .bind(room_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter()
            .map(|(id,)| Uuid::parse_str(&id).map_err(RelayError::from))
            .collect()
    }

    /// Per-room count of messages `user_id` has not read, over every room the
    /// user participates in. The user's own messages never count as unread.
    pub async fn unread_counts_by_room(&self, user_id: &str) -> RelayResult<BTreeMap<String, i64>> {
        require("userId", user_id)?;

        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT m.room_id,
                    SUM(CASE WHEN m.sender_id <> ?1 AND NOT EXISTS (
                        SELECT 1 FROM message_readers r WHERE r.message_id = m.id AND r.user_id = ?1
                    ) THEN 1 ELSE 0 END)
             FROM messages m
             WHERE instr(m.room_key, ?2) > 0
             GROUP BY m.room_id",
        )
        .bind(user_id)
        .bind(user_id.to_lowercase())
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Newest message of every room whose id contains `user_id`
    /// (case-insensitive), most active room first.
    pub async fn latest_per_room(&self, user_id: &str) -> RelayResult<Vec<Message>> {
        require("userId", user_id)?;
        let user_key = user_id.to_lowercase();

        let rows: Vec<MessageRow> = sqlx::query_as(
            "WITH latest AS (
                 SELECT *, ROW_NUMBER() OVER (
                     PARTITION BY room_id ORDER BY created_at DESC, seq DESC
                 ) AS newest
                 FROM messages
                 WHERE instr(room_key, ?1) > 0
             )
             SELECT id,room_id,sender_id,body,created_at,metadata FROM latest
             WHERE newest = 1
             ORDER BY created_at DESC, seq DESC",
        )
        .bind(&user_key)
        .fetch_all(&self.db_pool)
        .await?;

        let reader_rows: Vec<(String, String)> = sqlx::query_as(
            "WITH latest AS (
                 SELECT id, ROW_NUMBER() OVER (
                     PARTITION BY room_id ORDER BY created_at DESC, seq DESC
                 ) AS newest
                 FROM messages
                 WHERE instr(room_key, ?1) > 0
             )
             SELECT r.message_id,r.user_id FROM message_readers r
             JOIN latest l ON l.id = r.message_id
             WHERE l.newest = 1
             ORDER BY r.seq",
        )
        .bind(&user_key)
        .fetch_all(&self.db_pool)
        .await?;

        let mut readers = group_readers(reader_rows);
        rows.into_iter().map(|row| decode(row, &mut readers)).collect()
    }
}
