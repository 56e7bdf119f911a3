use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use tronic_db::models::parse_timestamp;
use tronic_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, attached to the request by `require_auth`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// The raw bearer token of the current request (logout needs it back).
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Gate for all protected routes. Each step fails closed; there are no
/// retries.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    // Own the token so the header borrow ends before extensions are mutated.
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?
        .to_string();

    let auth = authenticate(&state, &token)?;

    req.extensions_mut().insert(auth);
    req.extensions_mut().insert(SessionToken(token));
    Ok(next.run(req).await)
}

/// A token is accepted only if its signature verifies, a session row exists
/// for it, and that row has not expired. The session row is the authority on
/// expiry, so the credential's own `exp` claim is not checked here.
pub fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let mut validation = Validation::default();
    validation.validate_exp = false;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| ApiError::InvalidToken)?;

    let session = state
        .db
        .get_session(token)?
        .ok_or(ApiError::SessionNotFound)?;

    if parse_timestamp(&session.expires_at, "session") < Utc::now() {
        return Err(ApiError::SessionExpired);
    }

    let user_id: Uuid = session
        .user_id
        .parse()
        .map_err(|_| ApiError::InvalidToken)?;

    Ok(AuthUser { id: user_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_user, test_state};
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn signed_token(secret: &str, user_id: Uuid) -> String {
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            exp: (Utc::now() + Duration::hours(24)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn garbage_token_is_invalid() {
        let state = test_state(None);
        let result = authenticate(&state, "not-a-jwt");
        assert!(matches!(result, Err(ApiError::InvalidToken)));
    }

    #[test]
    fn wrong_signature_is_invalid() {
        let state = test_state(None);
        let user_id = seed_user(&state, "alice");
        let token = signed_token("some-other-secret", user_id);
        assert!(matches!(
            authenticate(&state, &token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn token_without_a_session_row_is_rejected() {
        let state = test_state(None);
        let user_id = seed_user(&state, "alice");
        let token = signed_token(&state.jwt_secret, user_id);
        assert!(matches!(
            authenticate(&state, &token),
            Err(ApiError::SessionNotFound)
        ));
    }

    #[test]
    fn expired_session_row_is_rejected() {
        let state = test_state(None);
        let user_id = seed_user(&state, "alice");
        let token = signed_token(&state.jwt_secret, user_id);
        state
            .db
            .create_session(
                &token,
                &user_id.to_string(),
                &tronic_db::to_rfc3339(Utc::now() - Duration::hours(1)),
            )
            .unwrap();
        assert!(matches!(
            authenticate(&state, &token),
            Err(ApiError::SessionExpired)
        ));
    }

    #[test]
    fn valid_session_resolves_the_user_and_revocation_takes_effect() {
        let state = test_state(None);
        let user_id = seed_user(&state, "alice");
        let token = signed_token(&state.jwt_secret, user_id);
        state
            .db
            .create_session(
                &token,
                &user_id.to_string(),
                &tronic_db::to_rfc3339(Utc::now() + Duration::hours(24)),
            )
            .unwrap();

        let auth = authenticate(&state, &token).unwrap();
        assert_eq!(auth.id, user_id);

        // Deleting the stored token makes the very next check fail.
        state.db.delete_session(&token).unwrap();
        assert!(matches!(
            authenticate(&state, &token),
            Err(ApiError::SessionNotFound)
        ));
    }
}
