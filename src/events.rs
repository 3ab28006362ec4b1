//! Frames exchanged with connected sessions.
//!
//! Both directions use `{"event": <name>, "data": {...}}`.

use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tracing::error;
use uuid::Uuid;

use crate::{GetField, RelayError, RelayResult, store::{Message, NewMessage}};

/// Intents a session sends to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientIntent {
    JoinRoom { room_id: String, user_id: Option<String> },
    LeaveRoom { room_id: String },
    SendMessage(NewMessage),
    UpdateReadStatus { room_id: String, user_id: String },
}

impl ClientIntent {
    pub fn from_text(text: &str) -> RelayResult<Self> {
        let frame: Value = serde_json::from_str(text)
            .map_err(|err| RelayError::Validation(format!("frame is not JSON: {err}")))?;
        Self::from_frame(&frame)
    }

    pub fn from_frame(frame: &Value) -> RelayResult<Self> {
        let event = frame.get_str_field("event")?;
        let data = frame.get_obj_field("data")?;

        Ok(match event.as_str() {
            "joinRoom" => ClientIntent::JoinRoom {
                room_id: data.get_str_field("roomId")?,
                user_id: data.get_str_field("userId").ok(),
            },
            "leaveRoom" => ClientIntent::LeaveRoom {
                room_id: data.get_str_field("roomId")?,
            },
            "sendMessage" => ClientIntent::SendMessage(NewMessage {
                room_id: data.get_str_field("roomId")?,
                sender_id: data.get_str_field("sender")?,
                body: data.get_str_field("message")?,
                metadata: match data.get("info") {
                    None | Some(Value::Null) => json!({}),
                    Some(info) => info.clone(),
                },
            }),
            "updateReadStatus" => ClientIntent::UpdateReadStatus {
                room_id: data.get_str_field("roomId")?,
                user_id: data.get_str_field("userId")?,
            },
            other => return Err(RelayError::Validation(format!("unknown event {other}"))),
        })
    }
}

/// Events the engine pushes to sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    JoinRoom { room_id: String },
    LeaveRoom { room_id: String },
    ReceiveMessage(MessagePreview),
    GlobalMessageUpdated { room_id: String, message: Message },
    UnreadMessagesUpdated { user_id: String, room_id: String },
    Error { message: String },
}

impl ServerEvent {
    pub fn to_text(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(text) => Some(text),
            Err(err) => {
                error!("failed to encode event: {err}");
                None
            }
        }
    }
}

/// Shape of a message as delivered to room members.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user: PreviewUser,
    pub read_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewUser {
    #[serde(rename = "_id")]
    pub id: String,
}

impl From<&Message> for MessagePreview {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            text: message.body.clone(),
            created_at: message.created_at,
            user: PreviewUser { id: message.sender_id.clone() },
            read_by: message.readers.clone(),
        }
    }
}
