use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::{
    RelayResult,
    events::{MessagePreview, ServerEvent},
    registry::{GLOBAL_ROOM, Registry, SessionId},
    store::{Message, MessageStore, NewMessage},
};

/// Fans persisted messages and read-state notifications out to sessions.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    store: MessageStore,
    // Held from append until fan-out finishes, so a room's messages go out
    // in the order they were stored.
    room_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, store: MessageStore) -> Self {
        Self {
            registry,
            store,
            room_locks: Arc::default(),
        }
    }

    /// Stores the message, then delivers `receiveMessage` to the room and
    /// `globalMessageUpdated` to the global room. Nothing is delivered if
    /// the message could not be stored.
    #[instrument(skip_all, fields(room_id = %new.room_id))]
    pub async fn send_message(&self, new: NewMessage) -> RelayResult<Message> {
        new.validate()?;

        let room_id = new.room_id.clone();
        let lock = self.room_lock(&room_id);
        let result = {
            let _guard = lock.lock().await;
            self.persist_and_broadcast(new).await
        };
        drop(lock);
        self.release_room_lock(&room_id);

        result
    }

    async fn persist_and_broadcast(&self, new: NewMessage) -> RelayResult<Message> {
        let message = self.store.append(new).await?;

        let members = self.registry.fan_out(
            &message.room_id,
            &ServerEvent::ReceiveMessage(MessagePreview::from(&message)),
        );
        let listeners = self.registry.fan_out(
            GLOBAL_ROOM,
            &ServerEvent::GlobalMessageUpdated {
                room_id: message.room_id.clone(),
                message: message.clone(),
            },
        );
        debug!(id = %message.id, members, listeners, "message broadcast");

        Ok(message)
    }

    /// Confirms to the acting session that `user_id` has read up to date in
    /// the room. Other members are not told.
    pub fn notify_read_advance(&self, session_id: SessionId, room_id: &str, user_id: &str) -> bool {
        self.registry.deliver(
            session_id,
            ServerEvent::UnreadMessagesUpdated {
                user_id: user_id.to_owned(),
                room_id: room_id.to_owned(),
            },
        )
    }

    fn room_lock(&self, room_id: &str) -> Arc<Mutex<()>> {
        self.room_locks
            .entry(room_id.to_owned())
            .or_default()
            .clone()
    }

    // Only the map holds the lock once nobody is sending to the room.
    fn release_room_lock(&self, room_id: &str) {
        self.room_locks
            .remove_if(room_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    use super::*;
    use crate::db;

    async fn dispatcher() -> (tempfile::TempDir, Dispatcher) {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("relay.db"))
            .create_if_missing(true);
        let db_pool = SqlitePoolOptions::new().connect_with(options).await.unwrap();
        db::init_schema(&db_pool).await.unwrap();

        let dispatcher = Dispatcher::new(Arc::new(Registry::new()), MessageStore::new(db_pool));
        (dir, dispatcher)
    }

    fn new_message(room_id: &str, body: &str) -> NewMessage {
        NewMessage {
            room_id: room_id.to_owned(),
            sender_id: "alice".to_owned(),
            body: body.to_owned(),
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn room_locks_are_released_after_sending() {
        let (_dir, dispatcher) = dispatcher().await;

        for i in 0..8 {
            dispatcher
                .send_message(new_message(&format!("room-{i}"), "hi"))
                .await
                .unwrap();
        }

        assert!(dispatcher.room_locks.is_empty());
    }

    #[tokio::test]
    async fn room_locks_are_released_after_concurrent_sends() {
        let (_dir, dispatcher) = dispatcher().await;

        let mut tasks = Vec::new();
        for i in 0..8 {
            let dispatcher = dispatcher.clone();
            tasks.push(tokio::spawn(async move {
                dispatcher.send_message(new_message("busy", &format!("m{i}"))).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(dispatcher.room_locks.is_empty());
    }

    #[tokio::test]
    async fn room_lock_is_released_when_storage_fails() {
        let (_dir, dispatcher) = dispatcher().await;
        dispatcher.store.pool().close().await;

        assert!(dispatcher.send_message(new_message("r1", "hi")).await.is_err());
        assert!(dispatcher.room_locks.is_empty());
    }
}
