use std::sync::Arc;
use std::time::Instant;

use tronic_ai::Responder;
use tronic_db::Database;
use tronic_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    /// `None` when no API key is configured; AI endpoints then fail with
    /// `GenerationError` while chat and commands degrade per their contracts.
    pub responder: Option<Arc<dyn Responder>>,
    pub started_at: Instant,
}
