//! Public route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::http::request::RequestId;
use crate::http::response::{ApiError, BatchEnvelope, DataEnvelope, PredictEnvelope};
use crate::http::server::AppState;
use crate::predict::types::{BatchRequest, DegradedMode, PredictionRequest, TrainingRequest, FEATURE_COUNT};

/// `POST /predict`
pub async fn predict(
    State(state): State<AppState>,
    request_id: RequestId,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictEnvelope>, ApiError> {
    let Json(request) = payload?;
    let prediction = state.service.submit(&request, request_id.as_deref()).await?;
    Ok(Json(prediction.into()))
}

/// `POST /predict/batch`
pub async fn predict_batch(
    State(state): State<AppState>,
    request_id: RequestId,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchEnvelope>, ApiError> {
    let Json(request) = payload?;
    let batch = state.service.submit_batch(&request, request_id.as_deref()).await?;
    Ok(Json(batch.into()))
}

/// `POST /train`
pub async fn train(
    State(state): State<AppState>,
    request_id: RequestId,
    payload: Result<Json<TrainingRequest>, JsonRejection>,
) -> Result<Json<DataEnvelope<serde_json::Value>>, ApiError> {
    let Json(request) = payload?;
    let data = state.service.train(&request, request_id.as_deref()).await?;
    Ok(Json(DataEnvelope::ok(data)))
}

/// `GET /ml-status`
pub async fn ml_status(State(state): State<AppState>, request_id: RequestId) -> Response {
    let status = state.service.ml_status(request_id.as_deref()).await;

    match status.health {
        Ok(ml_service) => (
            StatusCode::OK,
            Json(json!({
                "status": "operational",
                "mlService": ml_service,
                "breaker": status.breaker,
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "fallback": fallback_label(status.degraded_mode),
                "error": e.to_string(),
                "breaker": status.breaker,
            })),
        )
            .into_response(),
    }
}

fn fallback_label(mode: DegradedMode) -> &'static str {
    match mode {
        DegradedMode::Offline => "offline placeholder predictions",
        DegradedMode::RuleBased => "rule-based predictions",
    }
}

/// `GET /model/info`
///
/// Served locally; the version is the last one the ML service reported.
pub async fn model_info(State(state): State<AppState>) -> Json<DataEnvelope<serde_json::Value>> {
    let settings = state.service.settings();
    let version = state.service.last_model_version();
    Json(DataEnvelope::ok(json!({
        "mlServiceUrl": settings.client.base_url(),
        "degradedMode": settings.degraded_mode,
        "probabilityScale": settings.scale,
        "featureCount": FEATURE_COUNT,
        "lastModelVersion": version.as_deref(),
        "degraded": state.service.tally().is_tripped(),
    })))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let breaker = state.service.tally().snapshot();
    Json(json!({
        "status": if breaker.tripped { "degraded" } else { "ok" },
        "api": "ok",
        "breaker": breaker,
        "uptime": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /health/live`
pub async fn live() -> Json<serde_json::Value> {
    Json(json!({ "status": "alive" }))
}

/// `GET /health/ready`
pub async fn ready(State(state): State<AppState>) -> Response {
    if state.service.tally().is_tripped() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "reason": "ML service failure threshold reached",
            })),
        )
            .into_response();
    }
    Json(json!({ "status": "ready" })).into_response()
}
