use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ActivityEntry, CommandLog, CommandStatus, Message, Metric, UserProfile,
};

// -- JWT Claims --

/// Claims carried by the signed session credential. The `jti` is a fresh
/// v4 UUID per session, which keeps the token unguessable even though the
/// rest of the claims are predictable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
    pub room_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

// -- AI --

/// One prior conversational turn, most recent last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateRequest {
    pub prompt: String,
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub response: String,
    pub prompt: String,
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AiChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct AiChatResponse {
    pub response: String,
    pub message: String,
}

// -- Commands --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteCommandRequest {
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteCommandResponse {
    pub command_id: Uuid,
    pub command: String,
    pub status: CommandStatus,
}

#[derive(Debug, Serialize)]
pub struct CommandHistoryResponse {
    pub commands: Vec<CommandLog>,
}

// -- Activity --

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub activities: Vec<ActivityEntry>,
}

// -- Analytics --

#[derive(Debug, Default, Serialize)]
pub struct UserStats {
    pub total_users: u64,
    pub active_sessions: u64,
    pub messages_sent: u64,
    pub commands_run: u64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user_stats: UserStats,
    pub recent_messages: Vec<Message>,
    pub system_metrics: Vec<Metric>,
    pub recent_activity: Vec<ActivityEntry>,
}

// -- Monitoring --

#[derive(Debug, Deserialize)]
pub struct MetricIngestRequest {
    pub metric_name: String,
    pub metric_value: f64,
    pub metric_unit: Option<String>,
    #[serde(default)]
    pub tags: serde_json::Value,
}
