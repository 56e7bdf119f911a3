use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use serde_json::json;

use tronic_ai::{AiError, GENERATION_TIMEOUT, Responder};
use tronic_types::api::{AiChatRequest, AiChatResponse, GenerateRequest, GenerateResponse, Turn};
use tronic_types::models::ActivityAction;

use crate::activity::record_activity;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

/// Freeform generation. Unlike the chat relay, upstream failure here is the
/// caller's problem and surfaces as `GenerationError`.
pub async fn generate_response(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::Validation("prompt must not be empty".into()));
    }

    let full_prompt = match req.context.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!("{context}\n\n{prompt}"),
        None => prompt.to_string(),
    };

    let response = generate(&state, &full_prompt, &[]).await?;

    record_activity(
        &state,
        auth.id,
        ActivityAction::AiGeneration,
        json!({ "prompt_length": prompt.len(), "has_context": req.context.is_some() }),
    );

    Ok(Json(GenerateResponse {
        response,
        prompt: prompt.to_string(),
        context: req.context,
    }))
}

/// Conversational generation: prior turns are folded into the context
/// window, most recent last.
pub async fn chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<AiChatRequest>,
) -> ApiResult<Json<AiChatResponse>> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::Validation("message must not be empty".into()));
    }

    let response = generate(&state, message, &req.history).await?;

    record_activity(
        &state,
        auth.id,
        ActivityAction::AiGeneration,
        json!({ "message_length": message.len(), "history_length": req.history.len() }),
    );

    Ok(Json(AiChatResponse {
        response,
        message: message.to_string(),
    }))
}

async fn generate(state: &AppState, prompt: &str, history: &[Turn]) -> ApiResult<String> {
    let responder: &Arc<dyn Responder> = state
        .responder
        .as_ref()
        .ok_or(ApiError::Generation(AiError::MissingConfig))?;

    let reply = tokio::time::timeout(GENERATION_TIMEOUT, responder.generate(prompt, history))
        .await
        .map_err(|_| ApiError::Generation(AiError::Timeout))??;

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{StubResponder, seed_user, test_state};

    #[tokio::test]
    async fn generation_failure_surfaces_to_the_caller() {
        let state = test_state(Some(StubResponder::failing()));
        let user_id = seed_user(&state, "alice");

        let result = generate_response(
            State(state),
            Extension(AuthUser { id: user_id }),
            Json(GenerateRequest {
                prompt: "hello".into(),
                context: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Generation(_))));
    }

    #[tokio::test]
    async fn missing_responder_is_a_generation_error() {
        let state = test_state(None);
        let user_id = seed_user(&state, "alice");

        let result = chat(
            State(state),
            Extension(AuthUser { id: user_id }),
            Json(AiChatRequest {
                message: "hi".into(),
                history: vec![],
            }),
        )
        .await;
        assert!(matches!(
            result,
            Err(ApiError::Generation(AiError::MissingConfig))
        ));
    }

    #[tokio::test]
    async fn chat_returns_the_reply() {
        let state = test_state(Some(StubResponder::replying("42")));
        let user_id = seed_user(&state, "alice");

        let Json(response) = chat(
            State(state),
            Extension(AuthUser { id: user_id }),
            Json(AiChatRequest {
                message: "meaning of life?".into(),
                history: vec![Turn {
                    role: "User".into(),
                    content: "hello".into(),
                }],
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.response, "42");
    }
}
