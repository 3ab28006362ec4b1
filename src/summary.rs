//! Room Summary Aggregator
//!
//! Read-only views over the message store: the rooms a user takes part in
//! with their newest message, and unread counts per room. A user takes part
//! in every room whose id contains their user id.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::{
    RelayResult,
    store::{Message, MessageStore},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub handle: String,
    pub alias: String,
}

/// Lookup of user profiles, owned outside the messaging engine.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn profile(&self, user_id: &str) -> RelayResult<Option<Profile>>;
}

/// Directory backed by the `profiles` table.
pub struct SqliteDirectory {
    db_pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserDirectory for SqliteDirectory {
    async fn profile(&self, user_id: &str) -> RelayResult<Option<Profile>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT handle,alias FROM profiles WHERE user_id=?")
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(row.map(|(handle, alias)| Profile {
            user_id: user_id.to_owned(),
            handle,
            alias,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub latest_message: Message,
    pub sender_details: Option<Profile>,
}

#[derive(Clone)]
pub struct RoomSummaries {
    store: MessageStore,
    directory: Arc<dyn UserDirectory>,
}

impl RoomSummaries {
    pub fn new(store: MessageStore, directory: Arc<dyn UserDirectory>) -> Self {
        Self { store, directory }
    }

    /// Rooms `user_id` takes part in, each with its newest message and the
    /// sender's profile. Rooms without messages do not exist here.
    pub async fn list_rooms_for(&self, user_id: &str) -> RelayResult<Vec<RoomSummary>> {
        let latest = self.store.latest_per_room(user_id).await?;

        let mut summaries = Vec::with_capacity(latest.len());
        for message in latest {
            // Missing profile data never hides a room.
            let sender_details = match self.directory.profile(&message.sender_id).await {
                Ok(profile) => profile,
                Err(err) => {
                    warn!(sender_id = %message.sender_id, "profile lookup failed: {err}");
                    None
                }
            };
            summaries.push(RoomSummary {
                room_id: message.room_id.clone(),
                latest_message: message,
                sender_details,
            });
        }

        Ok(summaries)
    }

    pub async fn unread_counts_for(&self, user_id: &str) -> RelayResult<BTreeMap<String, i64>> {
        self.store.unread_counts_by_room(user_id).await
    }
}
