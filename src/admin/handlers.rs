use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::predict::types::{DegradedMode, ProbabilityScale};
use crate::resilience::TallySnapshot;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub ml_service_url: String,
    pub degraded_mode: DegradedMode,
    pub probability_scale: ProbabilityScale,
    pub breaker: TallySnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub reset: bool,
    pub previous: TallySnapshot,
    pub breaker: TallySnapshot,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let settings = state.service.settings();
    let breaker = state.service.tally().snapshot();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if breaker.tripped { "degraded" } else { "operational" },
        uptime_secs: state.started_at.elapsed().as_secs(),
        ml_service_url: settings.client.base_url().to_string(),
        degraded_mode: settings.degraded_mode,
        probability_scale: settings.scale,
        breaker,
    })
}

pub async fn get_breaker(State(state): State<AppState>) -> Json<TallySnapshot> {
    Json(state.service.tally().snapshot())
}

pub async fn reset_breaker(State(state): State<AppState>) -> Json<ResetOutcome> {
    let tally = state.service.tally();
    let previous = tally.snapshot();
    tally.reset();
    tracing::info!(previous_failures = previous.failure_count, "Failure tally reset by operator");

    Json(ResetOutcome {
        reset: true,
        previous,
        breaker: tally.snapshot(),
    })
}
