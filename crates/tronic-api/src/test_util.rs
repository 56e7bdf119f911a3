//! Shared helpers for the in-crate tests: an in-memory app state and a
//! scriptable responder.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use tronic_ai::{AiError, Responder};
use tronic_db::Database;
use tronic_gateway::dispatcher::Dispatcher;
use tronic_types::api::Turn;

use crate::state::{AppState, AppStateInner};

pub struct StubResponder {
    reply: Option<String>,
}

impl StubResponder {
    pub fn replying(text: &str) -> Arc<dyn Responder> {
        Arc::new(Self {
            reply: Some(text.to_string()),
        })
    }

    pub fn failing() -> Arc<dyn Responder> {
        Arc::new(Self { reply: None })
    }
}

#[async_trait]
impl Responder for StubResponder {
    async fn generate(&self, _prompt: &str, _history: &[Turn]) -> Result<String, AiError> {
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(AiError::Upstream {
                status: 503,
                body: "quota exceeded".into(),
            }),
        }
    }
}

pub fn test_state(responder: Option<Arc<dyn Responder>>) -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().expect("in-memory db"),
        jwt_secret: "test-secret".into(),
        dispatcher: Dispatcher::new(),
        responder,
        started_at: Instant::now(),
    })
}

pub fn seed_user(state: &AppState, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    state
        .db
        .create_user(
            &id.to_string(),
            &format!("{name}@example.com"),
            name,
            name,
            "hash",
        )
        .expect("seed user");
    id
}

/// Poll a condition produced by a detached task.
pub async fn wait_for<T>(mut f: impl FnMut() -> Option<T>) -> T {
    for _ in 0..200 {
        if let Some(value) = f() {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
