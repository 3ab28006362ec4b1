use axum::{debug_handler, extract::{rejection::JsonRejection, State}, Json};
use serde_json::{json, Value};

use crate::{receipts::ReadReceipts, AppResult, GetField, RelayError};

// No session is attached to an HTTP request, so nobody gets a socket
// confirmation here.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn mark_as_read(
    State(receipts): State<ReadReceipts>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = body.map_err(|rejection| RelayError::Validation(rejection.body_text()))?;
    let room_id = body.get_str_field("roomId")?;
    let user_id = body.get_str_field("userId")?;

    receipts.mark_room_read(&room_id, &user_id).await?;
    Ok(Json(json!({ "message": "Messages marked as read" })))
}
