use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Response}, Json};
use serde_json::json;
use tracing::debug;

use crate::{summary::RoomSummaries, AppResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn all_rooms(
    State(summaries): State<RoomSummaries>,
    Path(user_id): Path<String>,
) -> AppResult<Response> {
    let rooms = summaries.list_rooms_for(&user_id).await?;

    if rooms.is_empty() {
        debug!(user_id, "no rooms found");
        return Ok(Json(json!({ "message": "No rooms found" })).into_response());
    }

    Ok(Json(rooms).into_response())
}
