//! Room Membership Registry
//!
//! Tracks which live sessions sit in which rooms and owns the outbound
//! channel of every session.
//!
//! Lock order is always `sessions` then `rooms`; fan-out never holds both.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::ServerEvent;

pub type SessionId = Uuid;

/// Sending half of a session's transport.
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

/// Every session is a member of this room for as long as it is connected.
pub const GLOBAL_ROOM: &str = "globalRoom";

struct SessionEntry {
    user_id: Option<String>,
    rooms: HashSet<String>,
    outbound: Outbound,
}

/// Per-room member sets, sharded so unrelated rooms do not contend.
#[derive(Default)]
pub struct Registry {
    rooms: DashMap<String, HashSet<SessionId>>,
    sessions: DashMap<SessionId, SessionEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly connected session and puts it in the global room.
    pub fn connect(&self, session_id: SessionId, user_id: Option<String>, outbound: Outbound) {
        let mut entry = SessionEntry {
            user_id,
            rooms: HashSet::new(),
            outbound,
        };
        entry.rooms.insert(GLOBAL_ROOM.to_owned());

        self.sessions.insert(session_id, entry);
        self.rooms.entry(GLOBAL_ROOM.to_owned()).or_default().insert(session_id);

        info!(%session_id, "session connected");
    }

    /// Adds the session to the room and acknowledges it. Re-joining only
    /// re-acknowledges. Returns false for an unknown session.
    pub fn join(&self, session_id: SessionId, room_id: &str, user_id: Option<String>) -> bool {
        {
            let Some(mut session) = self.sessions.get_mut(&session_id) else {
                return false;
            };
            if user_id.is_some() {
                session.user_id = user_id;
            }
            session.rooms.insert(room_id.to_owned());
            self.rooms.entry(room_id.to_owned()).or_default().insert(session_id);
        }

        debug!(%session_id, room_id, "joined room");
        self.deliver(session_id, ServerEvent::JoinRoom { room_id: room_id.to_owned() })
    }

    /// Removes the session from the room and acknowledges it. Leaving a room
    /// the session is not in is a no-op apart from the acknowledgement; the
    /// global room cannot be left.
    pub fn leave(&self, session_id: SessionId, room_id: &str) -> bool {
        if room_id != GLOBAL_ROOM {
            let Some(mut session) = self.sessions.get_mut(&session_id) else {
                return false;
            };
            if session.rooms.remove(room_id) {
                self.remove_member(room_id, session_id);
            }
        }

        debug!(%session_id, room_id, "left room");
        self.deliver(session_id, ServerEvent::LeaveRoom { room_id: room_id.to_owned() })
    }

    /// Snapshot of the room's current members.
    pub fn members_of(&self, room_id: &str) -> Vec<SessionId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, session_id: SessionId, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.contains(&session_id))
    }

    pub fn user_of(&self, session_id: SessionId) -> Option<String> {
        self.sessions.get(&session_id)?.user_id.clone()
    }

    /// Forgets the session entirely. Once this returns no event can reach it.
    pub fn drop_session(&self, session_id: SessionId) {
        let Some((_, session)) = self.sessions.remove(&session_id) else {
            return;
        };
        for room_id in &session.rooms {
            self.remove_member(room_id, session_id);
        }

        info!(%session_id, rooms = session.rooms.len(), "session dropped");
    }

    /// Sends one event to one session. False if the session is gone.
    pub fn deliver(&self, session_id: SessionId, event: ServerEvent) -> bool {
        match self.sessions.get(&session_id) {
            Some(session) => session.outbound.send(event).is_ok(),
            None => false,
        }
    }

    /// Sends the event to every current member of the room; returns how many
    /// sessions it reached.
    pub fn fan_out(&self, room_id: &str, event: &ServerEvent) -> usize {
        self.members_of(room_id)
            .into_iter()
            .filter(|session_id| self.deliver(*session_id, event.clone()))
            .count()
    }

    fn remove_member(&self, room_id: &str, session_id: SessionId) {
        if let Some(mut members) = self.rooms.get_mut(room_id) {
            members.remove(&session_id);
        }
        self.rooms.remove_if(room_id, |_, members| members.is_empty());
    }
}
