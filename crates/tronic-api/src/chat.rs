use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;

use tronic_types::api::{MessagesResponse, SendMessageRequest};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::relay::{self, DEFAULT_ROOM};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination — pass the `created_at` timestamp of the
    /// oldest message from the previous page to fetch older messages.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let room_id = req.room_id.as_deref().unwrap_or(DEFAULT_ROOM);
    let message = relay::send_message(&state, auth.id, room_id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Room history in ascending creation-time order. Fetched newest-first with
/// an optional cursor, then reversed for display.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<MessageQuery>,
    Extension(_auth): Extension<AuthUser>,
) -> ApiResult<Json<MessagesResponse>> {
    // Run blocking DB queries off the async runtime
    let db_state = state.clone();
    let limit = query.limit.min(200);
    let before = query.before;

    let rows = tokio::task::spawn_blocking(move || {
        db_state.db.get_room_messages(&room_id, limit, before.as_deref())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Storage(anyhow::anyhow!("join error: {}", e))
    })??;

    let messages = rows
        .into_iter()
        .rev()
        .map(|row| row.into_message())
        .collect();

    Ok(Json(MessagesResponse { messages }))
}
