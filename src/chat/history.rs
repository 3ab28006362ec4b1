use axum::{debug_handler, extract::{Path, State}, Json};

use crate::{store::{Message, MessageStore}, AppResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn history(
    State(store): State<MessageStore>,
    Path(room_id): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(store.history(&room_id).await?))
}
