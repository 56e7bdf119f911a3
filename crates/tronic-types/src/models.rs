use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user profile as exposed over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A chat message, joined with author display info where available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: String,
    pub content: String,
    pub ai_response: Option<String>,
    pub author_username: Option<String>,
    pub author_display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a submitted command. Transitions exactly once from
/// `Running` to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Running,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub command: String,
    pub status: CommandStatus,
    pub output: Option<String>,
    pub execution_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Auditable user actions. The activity log is append-only; detail payloads
/// carry lengths and identifiers, never raw message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Login,
    Logout,
    SendMessage,
    ExecuteCommand,
    AiGeneration,
    ProfileUpdate,
    Registration,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::SendMessage => "send_message",
            Self::ExecuteCommand => "execute_command",
            Self::AiGeneration => "ai_generation",
            Self::ProfileUpdate => "profile_update",
            Self::Registration => "registration",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            "send_message" => Some(Self::SendMessage),
            "execute_command" => Some(Self::ExecuteCommand),
            "ai_generation" => Some(Self::AiGeneration),
            "profile_update" => Some(Self::ProfileUpdate),
            "registration" => Some(Self::Registration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: ActivityAction,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub metric_name: String,
    pub metric_value: f64,
    pub metric_unit: Option<String>,
    #[serde(default)]
    pub tags: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
