use axum::{Extension, Json, extract::State};
use tracing::warn;
use uuid::Uuid;

use tronic_types::api::{DashboardResponse, UserStats};
use tronic_types::models::{ActivityEntry, Message, Metric};

use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<DashboardResponse>> {
    Ok(Json(build_dashboard(&state, auth.id)))
}

/// Read-only composition of the dashboard slices. Each slice tolerates its
/// own storage failure by substituting empty data — a dashboard with partial
/// data beats a broken dashboard.
pub fn build_dashboard(state: &AppState, user_id: Uuid) -> DashboardResponse {
    let user_stats = user_stats(state, user_id).unwrap_or_else(|e| {
        warn!("Dashboard user-stats slice failed: {:#}", e);
        UserStats::default()
    });

    let recent_messages: Vec<Message> = state
        .db
        .recent_messages(10)
        .map(|rows| rows.into_iter().map(|row| row.into_message()).collect())
        .unwrap_or_else(|e| {
            warn!("Dashboard recent-messages slice failed: {:#}", e);
            Vec::new()
        });

    let system_metrics: Vec<Metric> = state
        .db
        .recent_metrics(50)
        .map(|rows| rows.into_iter().map(|row| row.into_metric()).collect())
        .unwrap_or_else(|e| {
            warn!("Dashboard system-metrics slice failed: {:#}", e);
            Vec::new()
        });

    let recent_activity: Vec<ActivityEntry> = state
        .db
        .get_activity(&user_id.to_string(), 10, 0, None)
        .map(|rows| rows.into_iter().filter_map(|row| row.into_entry()).collect())
        .unwrap_or_else(|e| {
            warn!("Dashboard recent-activity slice failed: {:#}", e);
            Vec::new()
        });

    DashboardResponse {
        user_stats,
        recent_messages,
        system_metrics,
        recent_activity,
    }
}

fn user_stats(state: &AppState, user_id: Uuid) -> anyhow::Result<UserStats> {
    let uid = user_id.to_string();
    Ok(UserStats {
        total_users: state.db.count_users()?,
        active_sessions: state.db.count_active_sessions()?,
        messages_sent: state.db.count_messages_by_user(&uid)?,
        commands_run: state.db.count_commands_by_user(&uid)?,
    })
}
