use std::time::Instant;

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use tronic_ai::{AiError, GENERATION_TIMEOUT};
use tronic_types::api::{CommandHistoryResponse, ExecuteCommandRequest, ExecuteCommandResponse};
use tronic_types::events::GatewayEvent;
use tronic_types::models::{ActivityAction, CommandStatus};

use crate::activity::record_activity;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::tasks::spawn_detached;

/// Fixed allow-list of read-only commands. This is a security boundary:
/// extending it is a review event, not a config change, and even allowed
/// commands are only ever explained, never executed.
pub const ALLOWED_COMMANDS: [&str; 15] = [
    "ls", "pwd", "whoami", "date", "uptime", "ps", "df", "free", "cat", "head", "tail", "grep",
    "find", "echo", "env",
];

/// Exact first-token membership check.
pub fn is_allowed(command: &str) -> bool {
    command
        .split_whitespace()
        .next()
        .is_some_and(|first| ALLOWED_COMMANDS.contains(&first))
}

pub async fn execute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<ExecuteCommandRequest>,
) -> ApiResult<impl IntoResponse> {
    let command = req.command.trim().to_string();
    if command.is_empty() {
        return Err(ApiError::Validation("command must not be empty".into()));
    }
    if !is_allowed(&command) {
        return Err(ApiError::CommandNotAllowed);
    }

    let log_id = Uuid::new_v4();
    state
        .db
        .insert_command_log(&log_id.to_string(), &auth.id.to_string(), &command)?;

    record_activity(
        &state,
        auth.id,
        ActivityAction::ExecuteCommand,
        json!({ "command": command }),
    );

    // Explanation completes in the background; clients treat the
    // `command-update` event as the source of truth for the result.
    let task_state = state.clone();
    let task_command = command.clone();
    spawn_detached("command-explainer", async move {
        run_explainer(task_state, log_id, task_command).await
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ExecuteCommandResponse {
            command_id: log_id,
            command,
            status: CommandStatus::Running,
        }),
    ))
}

/// Ask the responder to explain the command, then settle the log row and
/// broadcast the outcome. Failure is reported, not swallowed — the submitter
/// is waiting on this specific job.
pub async fn run_explainer(state: AppState, log_id: Uuid, command: String) -> anyhow::Result<()> {
    let start = Instant::now();

    let outcome = match &state.responder {
        Some(responder) => {
            let prompt = explain_prompt(&command);
            match tokio::time::timeout(GENERATION_TIMEOUT, responder.generate(&prompt, &[])).await {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(AiError::Timeout.to_string()),
            }
        }
        None => Err(AiError::MissingConfig.to_string()),
    };
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let (status, output) = match &outcome {
        Ok(text) => (CommandStatus::Completed, text.as_str()),
        Err(e) => (CommandStatus::Failed, e.as_str()),
    };

    let settled =
        state
            .db
            .finish_command_log(&log_id.to_string(), status.as_str(), output, elapsed_ms)?;
    if !settled {
        warn!("Command log {} already settled, skipping update", log_id);
        return Ok(());
    }

    let log = state
        .db
        .get_command_log(&log_id.to_string())?
        .ok_or_else(|| anyhow::anyhow!("command log {} vanished", log_id))?
        .into_log();

    state
        .dispatcher
        .broadcast(GatewayEvent::CommandUpdate(log))
        .await;

    Ok(())
}

fn explain_prompt(command: &str) -> String {
    format!(
        "Explain what the shell command `{command}` does and what its output \
         typically looks like. Describe only; do not execute anything."
    )
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<CommandHistoryResponse>> {
    let rows = state
        .db
        .get_command_logs(&auth.id.to_string(), query.limit.min(200), query.offset)?;

    Ok(Json(CommandHistoryResponse {
        commands: rows.into_iter().map(|row| row.into_log()).collect(),
    }))
}
