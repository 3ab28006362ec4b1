use std::collections::BTreeMap;

use axum::{debug_handler, extract::{Path, State}, Json};

use crate::{summary::RoomSummaries, AppResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn unread_counts(
    State(summaries): State<RoomSummaries>,
    Path(user_id): Path<String>,
) -> AppResult<Json<BTreeMap<String, i64>>> {
    Ok(Json(summaries.unread_counts_for(&user_id).await?))
}
