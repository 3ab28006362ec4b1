#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use roomrelay::{
    db,
    events::ServerEvent,
    registry::{Registry, SessionId},
    store::NewMessage,
    summary::{Profile, UserDirectory},
    RelayResult,
};
use serde_json::json;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A fresh on-disk database; keep the `TempDir` alive for the test's duration.
pub async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("relay.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .unwrap();
    db::init_schema(&db_pool).await.unwrap();
    (dir, db_pool)
}

pub fn new_message(room_id: &str, sender_id: &str, body: &str) -> NewMessage {
    NewMessage {
        room_id: room_id.to_owned(),
        sender_id: sender_id.to_owned(),
        body: body.to_owned(),
        metadata: json!({}),
    }
}

pub fn connect(registry: &Registry) -> (SessionId, mpsc::UnboundedReceiver<ServerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session_id = Uuid::now_v7();
    registry.connect(session_id, None, tx);
    (session_id, rx)
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[derive(Default)]
pub struct FixedDirectory(pub HashMap<String, Profile>);

impl FixedDirectory {
    pub fn with(users: &[(&str, &str)]) -> Self {
        Self(
            users
                .iter()
                .map(|(user_id, alias)| {
                    let profile = Profile {
                        user_id: (*user_id).to_owned(),
                        handle: format!("@{user_id}"),
                        alias: (*alias).to_owned(),
                    };
                    ((*user_id).to_owned(), profile)
                })
                .collect(),
        )
    }
}

#[async_trait]
impl UserDirectory for FixedDirectory {
    async fn profile(&self, user_id: &str) -> RelayResult<Option<Profile>> {
        Ok(self.0.get(user_id).cloned())
    }
}
