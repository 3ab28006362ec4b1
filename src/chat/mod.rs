mod history;
mod read;
mod rooms;
mod unread;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/all-rooms/{user_id}", get(rooms::all_rooms))
        .route("/unread/{user_id}", get(unread::unread_counts))
        .route("/markAsRead", post(read::mark_as_read))
        .route("/{room_id}", get(history::history))
}
