use axum::{Json, extract::State};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use tronic_types::api::MetricIngestRequest;
use tronic_types::events::GatewayEvent;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: String,
}

/// Best-effort metric ingestion: a storage failure is logged and reported as
/// accepted anyway, but the live `metric-update` only goes out for metrics
/// that were actually stored.
pub async fn ingest_metric(
    State(state): State<AppState>,
    Json(req): Json<MetricIngestRequest>,
) -> ApiResult<Json<IngestResponse>> {
    if req.metric_name.trim().is_empty() {
        return Err(ApiError::Validation("metric_name must not be empty".into()));
    }

    let stored = state.db.insert_metric(
        &Uuid::new_v4().to_string(),
        &req.metric_name,
        req.metric_value,
        req.metric_unit.as_deref(),
        &req.tags.to_string(),
    );

    match stored {
        Ok(()) => {
            state
                .dispatcher
                .broadcast(GatewayEvent::MetricUpdate {
                    metric_name: req.metric_name,
                    metric_value: req.metric_value,
                    metric_unit: req.metric_unit,
                    tags: req.tags,
                    timestamp: Utc::now(),
                })
                .await;
        }
        Err(e) => warn!("Metric ingestion failed: {:#}", e),
    }

    Ok(Json(IngestResponse {
        message: "Metric recorded".into(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<Utc>,
    pub uptime_seconds: u64,
    pub database: &'static str,
    pub ai_responder: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.ping() {
        Ok(()) => "connected",
        Err(e) => {
            warn!("Health check database ping failed: {:#}", e);
            "error"
        }
    };

    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        database,
        ai_responder: if state.responder.is_some() {
            "configured"
        } else {
            "unconfigured"
        },
    })
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub database: &'static str,
    pub ai_responder: &'static str,
    pub timestamp: chrono::DateTime<Utc>,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        database: match state.db.ping() {
            Ok(()) => "connected",
            Err(_) => "error",
        },
        ai_responder: if state.responder.is_some() {
            "configured"
        } else {
            "unconfigured"
        },
        timestamp: Utc::now(),
    })
}
