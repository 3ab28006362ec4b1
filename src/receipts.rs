use tracing::debug;
use uuid::Uuid;

use crate::{
    RelayResult,
    dispatch::Dispatcher,
    registry::SessionId,
    store::MessageStore,
};

/// Read-Receipt Tracker
#[derive(Clone)]
pub struct ReadReceipts {
    store: MessageStore,
    dispatcher: Dispatcher,
}

impl ReadReceipts {
    pub fn new(store: MessageStore, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Marks every message of the room read for `user_id` and returns the
    /// ids that changed state. Calling it again returns an empty set.
    pub async fn mark_room_read(&self, room_id: &str, user_id: &str) -> RelayResult<Vec<Uuid>> {
        let changed = self.store.mark_read(room_id, user_id).await?;
        debug!(room_id, user_id, changed = changed.len(), "room marked read");
        Ok(changed)
    }

    /// Same as [`Self::mark_room_read`], then confirms to `session_id`.
    /// Other members of the room are not told.
    pub async fn mark_room_read_for(
        &self,
        session_id: SessionId,
        room_id: &str,
        user_id: &str,
    ) -> RelayResult<Vec<Uuid>> {
        let changed = self.mark_room_read(room_id, user_id).await?;
        self.dispatcher.notify_read_advance(session_id, room_id, user_id);
        Ok(changed)
    }
}
