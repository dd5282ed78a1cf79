use std::time::SystemTime;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
        .route("/info", get(info))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    is_processing: bool,
    word_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthInfoResponse {
    service: &'static str,
    version: &'static str,
    start_time: String,
    uptime: u64,
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let orchestrator = state.orchestrator();
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
        is_processing: orchestrator.is_processing(),
        word_count: orchestrator.words().len(),
    })
}

async fn live() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

async fn info(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthInfoResponse {
        service: "flashcard-forge",
        version: env!("CARGO_PKG_VERSION"),
        start_time: system_time_iso(state.started_at_system()),
        uptime: state.uptime_seconds(),
    })
}

fn system_time_iso(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}
