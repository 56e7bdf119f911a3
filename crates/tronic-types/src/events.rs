use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CommandLog, Message};

/// Events sent from server to connected WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum GatewayEvent {
    /// A message was posted to a room. Room-scoped: delivered only to
    /// connections currently joined to `message.room_id`.
    NewMessage(Message),

    /// A command explanation finished (completed or failed).
    CommandUpdate(CommandLog),

    /// A user came online or went offline.
    UserStatusChange {
        #[serde(rename = "userId")]
        user_id: Uuid,
        status: String,
    },

    /// A system metric was ingested.
    MetricUpdate {
        metric_name: String,
        metric_value: f64,
        metric_unit: Option<String>,
        tags: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
}

/// Events sent from client to server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum GatewayCommand {
    /// Subscribe this connection to a room's events.
    JoinRoom(String),

    /// Unsubscribe this connection from a room. No-op if not joined.
    LeaveRoom(String),

    /// Relay a chat message (same path as the REST endpoint).
    SendMessage {
        content: String,
        room_id: Option<String>,
        user_id: Uuid,
    },

    /// Announce presence to other connections.
    UserOnline(Uuid),
    UserOffline(Uuid),
}
