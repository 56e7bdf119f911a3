use axum::{Extension, Json, extract::{Query, State}};
use serde::Deserialize;
use uuid::Uuid;

use tronic_types::api::ActivityResponse;
use tronic_types::models::ActivityAction;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::tasks::spawn_detached;

/// Append one audit row in the background. Storage failures surface only in
/// the process log; activity logging must never block or fail the primary
/// operation.
pub fn record_activity(
    state: &AppState,
    user_id: Uuid,
    action: ActivityAction,
    details: serde_json::Value,
) {
    let state = state.clone();
    spawn_detached("activity-log", async move {
        state.db.insert_activity(
            &Uuid::new_v4().to_string(),
            &user_id.to_string(),
            action.as_str(),
            &details.to_string(),
        )
    });
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    pub action: Option<String>,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<ActivityResponse>> {
    let action = match query.action.as_deref() {
        Some(raw) => Some(
            ActivityAction::parse(raw)
                .ok_or_else(|| ApiError::Validation(format!("unknown action '{raw}'")))?,
        ),
        None => None,
    };

    let rows = state.db.get_activity(
        &auth.id.to_string(),
        query.limit.min(200),
        query.offset,
        action.map(|a| a.as_str()),
    )?;

    Ok(Json(ActivityResponse {
        activities: rows.into_iter().filter_map(|row| row.into_entry()).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_user, test_state, wait_for};

    #[tokio::test]
    async fn record_activity_is_fire_and_forget() {
        let state = test_state(None);
        let user_id = seed_user(&state, "alice");

        record_activity(
            &state,
            user_id,
            ActivityAction::Login,
            serde_json::json!({ "email": "alice@example.com" }),
        );

        let rows = wait_for(|| {
            let rows = state
                .db
                .get_activity(&user_id.to_string(), 10, 0, None)
                .unwrap();
            (!rows.is_empty()).then_some(rows)
        })
        .await;
        assert_eq!(rows[0].action, "login");
    }

    #[tokio::test]
    async fn logging_failure_does_not_surface() {
        let state = test_state(None);
        // No user row exists, but user_activity has no FK on user_id and the
        // call must not panic or error either way.
        record_activity(
            &state,
            Uuid::new_v4(),
            ActivityAction::Logout,
            serde_json::json!({}),
        );
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn unknown_action_filter_is_a_validation_error() {
        let state = test_state(None);
        let user_id = seed_user(&state, "alice");
        let result = list_activity(
            State(state),
            Extension(AuthUser { id: user_id }),
            Query(ActivityQuery {
                limit: 10,
                offset: 0,
                action: Some("self-destruct".into()),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
