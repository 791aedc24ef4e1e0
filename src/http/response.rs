//! Response envelopes and error mapping.
//!
//! # Status mapping
//! - Validation failure → 400
//! - ML service timeout or unreachable → 503
//! - ML service non-2xx or unparseable body → 500
//!
//! A degraded answer is a 200 with `degraded: true`; the payload carries
//! `model_version: "offline"` so callers can tell it from a weak prediction.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::predict::service::ServiceError;
use crate::predict::types::{BatchPrediction, BatchSummary, Prediction, PredictionResult};
use crate::predict::validation::InvalidRequest;
use crate::upstream::UpstreamError;

/// Body of `POST /predict`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictEnvelope {
    pub success: bool,
    pub degraded: bool,
    pub data: PredictionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategic_advice: Option<serde_json::Value>,
}

impl From<Prediction> for PredictEnvelope {
    fn from(p: Prediction) -> Self {
        let insights = p.insights.unwrap_or_default();
        Self {
            success: true,
            degraded: p.degraded,
            data: p.result,
            ai_insights: insights.ai_insights,
            strategic_advice: insights.strategic_advice,
        }
    }
}

/// Body of `POST /predict/batch`.
#[derive(Debug, Serialize)]
pub struct BatchEnvelope {
    pub success: bool,
    pub degraded: bool,
    pub summary: BatchSummary,
    pub data: Vec<PredictionResult>,
}

impl From<BatchPrediction> for BatchEnvelope {
    fn from(b: BatchPrediction) -> Self {
        Self {
            success: true,
            degraded: b.degraded,
            summary: BatchSummary::from_results(&b.results),
            data: b.results,
        }
    }
}

/// Generic success body.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
}

/// Error returned by public handlers.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Invalid(_) => StatusCode::BAD_REQUEST,
            ServiceError::Upstream(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError(e)
    }
}

impl From<InvalidRequest> for ApiError {
    fn from(e: InvalidRequest) -> Self {
        ApiError(ServiceError::Invalid(e))
    }
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        ApiError(ServiceError::Upstream(e))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::from(InvalidRequest::MalformedBody(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        (
            self.status(),
            Json(ErrorBody {
                success: false,
                error: &message,
            }),
        )
            .into_response()
    }
}
