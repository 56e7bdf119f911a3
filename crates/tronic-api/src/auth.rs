use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use uuid::Uuid;

use tronic_types::api::{
    Claims, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse,
};
use tronic_types::models::{ActivityAction, UserProfile};

use crate::activity::record_activity;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthUser, SessionToken};
use crate::state::AppState;

/// Session lifetime. Expired rows are rejected by the auth gate and count
/// as inactive in the dashboard.
pub const SESSION_TTL_HOURS: i64 = 24;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    // Validate input
    if !req.email.contains('@') {
        return Err(ApiError::Validation("a valid email is required".into()));
    }
    if req.username.trim().len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "username must be between 3 and 32 characters".into(),
        ));
    }
    if req.password.len() < 6 {
        return Err(ApiError::Validation(
            "password must be at least 6 characters".into(),
        ));
    }

    let username = req.username.trim().to_string();

    if state.db.get_user_by_email(&req.email)?.is_some() {
        return Err(ApiError::Conflict("email is already registered".into()));
    }
    if state.db.get_user_by_username(&username)?.is_some() {
        return Err(ApiError::Conflict("username is taken".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Storage(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();
    state.db.create_user(
        &user_id.to_string(),
        &req.email,
        &username,
        &username,
        &password_hash,
    )?;

    let user = fetch_profile(&state, user_id)?;

    record_activity(
        &state,
        user_id,
        ActivityAction::Registration,
        json!({ "email": req.email }),
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = state
        .db
        .get_user_by_email(&req.email)?
        .ok_or(ApiError::Unauthenticated)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| ApiError::Storage(anyhow::anyhow!("corrupt password hash: {}", e)))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthenticated)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Storage(anyhow::anyhow!("corrupt user id: {}", e)))?;

    let (token, expires_at) = create_token(&state.jwt_secret, user_id)?;
    state.db.create_session(
        &token,
        &user.id,
        &tronic_db::to_rfc3339(expires_at),
    )?;

    record_activity(
        &state,
        user_id,
        ActivityAction::Login,
        json!({ "email": req.email }),
    );

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token,
        user: user.into_profile(),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Extension(SessionToken(token)): Extension<SessionToken>,
) -> ApiResult<Json<LogoutResponse>> {
    state.db.delete_session(&token)?;

    record_activity(&state, auth.id, ActivityAction::Logout, json!({}));

    Ok(Json(LogoutResponse {
        message: "Logout successful".into(),
    }))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(fetch_profile(&state, auth.id)?))
}

fn fetch_profile(state: &AppState, user_id: Uuid) -> ApiResult<UserProfile> {
    Ok(state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or(ApiError::NotFound)?
        .into_profile())
}

/// Issue the signed session credential. The random `jti` gives each token
/// well over the required 122 bits of entropy on top of the signature.
fn create_token(secret: &str, user_id: Uuid) -> ApiResult<(String, DateTime<Utc>)> {
    let expires_at = Utc::now() + chrono::Duration::hours(SESSION_TTL_HOURS);
    let claims = Claims {
        sub: user_id,
        jti: Uuid::new_v4(),
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Storage(anyhow::anyhow!("token signing failed: {}", e)))?;

    Ok((token, expires_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_user, test_state};
    use axum::extract::State;

    #[tokio::test]
    async fn register_rejects_weak_input() {
        let state = test_state(None);

        let bad_email = register(
            State(state.clone()),
            Json(RegisterRequest {
                email: "not-an-email".into(),
                username: "alice".into(),
                password: "secret123".into(),
            }),
        )
        .await;
        assert!(matches!(bad_email, Err(ApiError::Validation(_))));

        let short_password = register(
            State(state),
            Json(RegisterRequest {
                email: "a@b.c".into(),
                username: "alice".into(),
                password: "x".into(),
            }),
        )
        .await;
        assert!(matches!(short_password, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let state = test_state(None);
        let req = || RegisterRequest {
            email: "a@example.com".into(),
            username: "alice".into(),
            password: "secret123".into(),
        };
        register(State(state.clone()), Json(req())).await.unwrap();
        let second = register(State(state), Json(req())).await;
        assert!(matches!(second, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn issued_token_passes_the_session_store() {
        let state = test_state(None);
        let user_id = seed_user(&state, "alice");

        let (token, expires_at) = create_token(&state.jwt_secret, user_id).unwrap();
        state
            .db
            .create_session(&token, &user_id.to_string(), &tronic_db::to_rfc3339(expires_at))
            .unwrap();

        let session = state.db.get_session(&token).unwrap().expect("session row");
        assert_eq!(session.user_id, user_id.to_string());

        // Two tokens for the same user are distinct (random jti).
        let (other, _) = create_token(&state.jwt_secret, user_id).unwrap();
        assert_ne!(token, other);
    }
}
