use axum::{
    debug_handler,
    extract::{Query, State, WebSocketUpgrade, ws::{Message as WsMessage, WebSocket}},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    AppState, RelayError,
    events::{ClientIntent, ServerEvent},
    registry::SessionId,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    pub user_id: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub async fn connect(
    State(state): State<AppState>,
    Query(ConnectQuery { user_id }): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(async move |stream| run(state, user_id, stream).await)
}

async fn run(state: AppState, user_id: Option<String>, stream: WebSocket) {
    let session_id = Uuid::now_v7();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.registry.connect(session_id, user_id, tx);

    let (mut sender, mut receiver) = stream.split();

    let mut outbound_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(text) = event.to_text() else {
                continue;
            };
            if sender.send(text.into()).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let Some(Ok(frame)) = frame else {
                    break;
                };
                let text = match frame {
                    WsMessage::Text(text) => text,
                    WsMessage::Close(_) => break,
                    _ => continue,
                };
                match ClientIntent::from_text(text.as_str()) {
                    Ok(intent) => handle_intent(&state, session_id, intent).await,
                    Err(err) => report(&state, session_id, "invalid frame", err),
                }
            }
            _ = &mut outbound_task => break,
        }
    }

    let user_id = state.registry.user_of(session_id);
    state.registry.drop_session(session_id);
    outbound_task.abort();
    info!(%session_id, ?user_id, "client disconnected");
}

/// Applies one intent on behalf of a session. Failures are reported to that
/// session only.
pub async fn handle_intent(state: &AppState, session_id: SessionId, intent: ClientIntent) {
    match intent {
        ClientIntent::JoinRoom { room_id, user_id } => {
            if !state.registry.join(session_id, &room_id, user_id) {
                warn!(%session_id, "join from unknown session");
            }
        }
        ClientIntent::LeaveRoom { room_id } => {
            state.registry.leave(session_id, &room_id);
        }
        ClientIntent::SendMessage(new) => {
            let sender_id = new.sender_id.clone();
            let message = match state.dispatcher.send_message(new).await {
                Ok(message) => message,
                Err(err) => return report(state, session_id, "failed to send message", err),
            };

            if state.registry.is_member(session_id, &message.room_id) {
                if let Err(err) = state
                    .receipts
                    .mark_room_read_for(session_id, &message.room_id, &sender_id)
                    .await
                {
                    report(state, session_id, "failed to update read status", err);
                }
            }
        }
        ClientIntent::UpdateReadStatus { room_id, user_id } => {
            if let Err(err) = state.receipts.mark_room_read_for(session_id, &room_id, &user_id).await {
                report(state, session_id, "failed to update read status", err);
            }
        }
    }
}

fn report(state: &AppState, session_id: SessionId, what: &str, err: RelayError) {
    let message = if err.is_validation() {
        warn!(%session_id, "{what}: {err}");
        err.to_string()
    } else {
        error!(%session_id, "{what}: {err}");
        what.to_owned()
    };
    state.registry.deliver(session_id, ServerEvent::Error { message });
}
