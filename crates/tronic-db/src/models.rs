//! Database row types — these map directly to SQLite rows.
//! Conversions into the typed API records live here so the rest of the
//! system never sees the store's loosely-typed strings.

use chrono::{DateTime, Utc};
use tracing::warn;
use tronic_types::models::{
    ActivityAction, ActivityEntry, CommandLog, CommandStatus, Message, Metric, UserProfile,
};
use uuid::Uuid;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

pub struct SessionRow {
    pub token: String,
    pub user_id: String,
    pub expires_at: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub user_id: String,
    pub room_id: String,
    pub content: String,
    pub ai_response: Option<String>,
    pub author_username: Option<String>,
    pub author_display_name: Option<String>,
    pub created_at: String,
}

pub struct CommandLogRow {
    pub id: String,
    pub user_id: String,
    pub command: String,
    pub status: String,
    pub output: Option<String>,
    pub execution_time_ms: Option<u64>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

pub struct ActivityRow {
    pub id: String,
    pub user_id: String,
    pub action: String,
    pub details: String,
    pub created_at: String,
}

pub struct MetricRow {
    pub metric_name: String,
    pub metric_value: f64,
    pub metric_unit: Option<String>,
    pub tags: String,
    pub created_at: String,
}

/// Parse a stored timestamp, tolerating SQLite's bare "YYYY-MM-DD HH:MM:SS"
/// form in case rows were written outside the application.
pub fn parse_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

fn parse_uuid(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid '{}' on {}: {}", raw, context, e);
        Uuid::default()
    })
}

fn parse_details(raw: &str, context: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt details payload on {}: {}", context, e);
        serde_json::Value::Null
    })
}

impl UserRow {
    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            id: parse_uuid(&self.id, "user"),
            email: self.email,
            username: self.username,
            display_name: self.display_name,
            role: self.role,
            avatar_url: self.avatar_url,
            created_at: parse_timestamp(&self.created_at, "user"),
        }
    }
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        Message {
            id: parse_uuid(&self.id, "message"),
            user_id: parse_uuid(&self.user_id, "message"),
            room_id: self.room_id,
            content: self.content,
            ai_response: self.ai_response,
            author_username: self.author_username,
            author_display_name: self.author_display_name,
            created_at: parse_timestamp(&self.created_at, "message"),
        }
    }
}

impl CommandLogRow {
    pub fn into_log(self) -> CommandLog {
        let status = CommandStatus::parse(&self.status).unwrap_or_else(|| {
            warn!("Corrupt status '{}' on command log '{}'", self.status, self.id);
            CommandStatus::Failed
        });
        CommandLog {
            id: parse_uuid(&self.id, "command log"),
            user_id: parse_uuid(&self.user_id, "command log"),
            command: self.command,
            status,
            output: self.output,
            execution_time_ms: self.execution_time_ms,
            created_at: parse_timestamp(&self.created_at, "command log"),
            completed_at: self
                .completed_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, "command log")),
        }
    }
}

impl ActivityRow {
    pub fn into_entry(self) -> Option<ActivityEntry> {
        // Unknown action tags are skipped rather than surfaced: the audit
        // trail is read-only display data.
        let action = match ActivityAction::parse(&self.action) {
            Some(action) => action,
            None => {
                warn!("Unknown activity action '{}' on '{}'", self.action, self.id);
                return None;
            }
        };
        Some(ActivityEntry {
            id: parse_uuid(&self.id, "activity"),
            user_id: parse_uuid(&self.user_id, "activity"),
            action,
            details: parse_details(&self.details, "activity"),
            created_at: parse_timestamp(&self.created_at, "activity"),
        })
    }
}

impl MetricRow {
    pub fn into_metric(self) -> Metric {
        Metric {
            metric_value: self.metric_value,
            metric_unit: self.metric_unit,
            tags: parse_details(&self.tags, "metric"),
            created_at: parse_timestamp(&self.created_at, "metric"),
            metric_name: self.metric_name,
        }
    }
}
