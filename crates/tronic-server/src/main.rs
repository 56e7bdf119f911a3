mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tronic_ai::{GeminiClient, Responder};
use tronic_api::error::ApiError;
use tronic_api::middleware::require_auth;
use tronic_api::relay::RelaySink;
use tronic_api::state::{AppState, AppStateInner};
use tronic_api::{activity, ai, analytics, auth, chat, commands, monitoring};
use tronic_gateway::connection;
use tronic_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tronic=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = tronic_db::Database::open(&PathBuf::from(&config.db_path))?;

    // AI responder is optional; without a key the AI endpoints report
    // generation errors and the chat relay degrades gracefully.
    let responder: Option<Arc<dyn Responder>> = match &config.ai_api_key {
        Some(key) => Some(Arc::new(GeminiClient::new(
            key.clone(),
            config.ai_base_url.clone(),
            config.ai_model.clone(),
        )?)),
        None => {
            warn!("GEMINI_API_KEY not set, AI responder disabled");
            None
        }
    };

    // Shared state
    let dispatcher = Dispatcher::new();
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        dispatcher: dispatcher.clone(),
        responder,
        started_at: Instant::now(),
    });

    // Routes
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/monitoring/metrics", post(monitoring::ingest_metric))
        .route("/api/monitoring/health", get(monitoring::health))
        .route("/api/status", get(monitoring::status));

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/user/profile", get(auth::profile))
        .route("/api/chat/send-message", post(chat::send_message))
        .route("/api/chat/messages/{room_id}", get(chat::get_messages))
        .route("/api/ai/generate-response", post(ai::generate_response))
        .route("/api/ai/chat", post(ai::chat))
        .route("/api/commands/execute", post(commands::execute))
        .route("/api/commands/history", get(commands::history))
        .route("/api/analytics/dashboard", get(analytics::dashboard))
        .route("/api/logs/user-activity", get(activity::list_activity))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let ws_route = Router::new().route("/api/gateway", get(ws_upgrade));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .fallback(|| async { ApiError::NotFound.into_response() })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("TRONIC server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let sink = Arc::new(RelaySink(state));
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, sink))
}
