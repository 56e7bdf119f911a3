use async_trait::async_trait;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use tronic_ai::GENERATION_TIMEOUT;
use tronic_gateway::connection::MessageSink;
use tronic_types::events::GatewayEvent;
use tronic_types::models::{ActivityAction, Message};

use crate::activity::record_activity;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Messages sent to this room get an AI reply attached before broadcast.
pub const AI_ROOM: &str = "ai-assistant";

pub const DEFAULT_ROOM: &str = "general";

/// The message relay: validate, persist, attach an AI reply when addressed
/// to the assistant room, broadcast to the room, record activity.
///
/// The AI reply is attached synchronously: room members receive exactly one
/// `new-message` event per send, already carrying the reply when one was
/// produced. AI failure is non-fatal; the send still succeeds with an empty
/// reply field.
pub async fn send_message(
    state: &AppState,
    user_id: Uuid,
    room_id: &str,
    content: &str,
) -> ApiResult<Message> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::Validation("message content must not be empty".into()));
    }

    let message_id = Uuid::new_v4();

    // Run blocking DB insert off the async runtime
    let db_state = state.clone();
    let mid = message_id.to_string();
    let uid = user_id.to_string();
    let rid = room_id.to_string();
    let body = content.to_string();
    tokio::task::spawn_blocking(move || {
        db_state
            .db
            .insert_message(&mid, &uid, &rid, &body, &tronic_db::now_rfc3339())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Storage(anyhow::anyhow!("join error: {}", e))
    })??;

    // AI attachment for the assistant room; failure leaves the reply empty
    // and is logged only.
    if room_id == AI_ROOM {
        match &state.responder {
            Some(responder) => {
                let reply =
                    tokio::time::timeout(GENERATION_TIMEOUT, responder.generate(content, &[]))
                        .await;
                match reply {
                    Ok(Ok(text)) => {
                        if let Err(e) = state
                            .db
                            .set_message_ai_response(&message_id.to_string(), &text)
                        {
                            warn!("Failed to attach AI reply to {}: {:#}", message_id, e);
                        }
                    }
                    Ok(Err(e)) => warn!("AI reply failed for {}: {}", message_id, e),
                    Err(_) => warn!("AI reply timed out for {}", message_id),
                }
            }
            None => warn!("Message to {} with no responder configured", AI_ROOM),
        }
    }

    let message = state
        .db
        .get_message(&message_id.to_string())?
        .ok_or_else(|| ApiError::Storage(anyhow::anyhow!("message vanished after insert")))?
        .into_message();

    state
        .dispatcher
        .publish(room_id, GatewayEvent::NewMessage(message.clone()))
        .await;

    // Privacy-preserving detail policy: length and room, never the content.
    record_activity(
        state,
        user_id,
        ActivityAction::SendMessage,
        json!({ "room_id": room_id, "content_length": content.len() }),
    );

    Ok(message)
}

/// Adapter that lets the WebSocket loop feed the relay without the gateway
/// crate depending on this one. Relay errors on the socket path are logged
/// and dropped; the peer learns outcomes through room events only.
pub struct RelaySink(pub AppState);

#[async_trait]
impl MessageSink for RelaySink {
    async fn relay(&self, user_id: Uuid, room_id: String, content: String) {
        if let Err(e) = send_message(&self.0, user_id, &room_id, &content).await {
            warn!("WebSocket relay failed for {}: {}", user_id, e);
        }
    }
}
