//! Prediction proxy service.
//!
//! # Responsibilities
//! - Validate requests before anything else
//! - Short-circuit to a degraded answer while the failure tally is tripped
//! - Forward to the ML service under per-call deadlines
//! - Keep the tally current: success resets, failure increments
//!
//! # Design Decisions
//! - Enrichment via `/enhance` is decoration; its failure is logged and dropped
//! - A batch is one upstream call and one tally event, all-or-nothing
//! - Training and health checks never increment the tally
//! - A healthy `/health` check clears a tripped tally; otherwise nothing
//!   would ever call upstream again to observe recovery

use std::sync::Arc;
use std::time::Instant;

use arc_swap::{ArcSwap, ArcSwapOption};
use thiserror::Error;

use crate::config::ProxyConfig;
use crate::observability::metrics;
use crate::predict::types::{
    BatchPrediction, BatchRequest, DegradedMode, Insights, MatchFixture, Prediction,
    PredictionRequest, PredictionResult, ProbabilityScale, TrainingRequest,
    UNREPORTED_MODEL_VERSION,
};
use crate::predict::validation::{validate_batch, validate_prediction, validate_training, InvalidRequest};
use crate::resilience::{with_deadline, CallKind, FailureTally, TallySnapshot, TimeoutPolicy};
use crate::upstream::{MlClient, SetupError, UpstreamError};

/// Error surfaced to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Invalid(#[from] InvalidRequest),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Settings that may change on config reload.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub client: MlClient,
    pub timeouts: TimeoutPolicy,
    pub degraded_mode: DegradedMode,
    pub scale: ProbabilityScale,
}

/// Result of probing the ML service.
#[derive(Debug, Clone)]
pub struct MlStatus {
    pub health: Result<serde_json::Value, UpstreamError>,
    pub breaker: TallySnapshot,
    pub degraded_mode: DegradedMode,
}

/// The prediction proxy.
pub struct PredictionService {
    http: reqwest::Client,
    settings: ArcSwap<ServiceSettings>,
    tally: Arc<FailureTally>,
    model_version: ArcSwapOption<String>,
}

impl PredictionService {
    pub fn from_config(config: &ProxyConfig) -> Result<Self, SetupError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SetupError::HttpClient(e.to_string()))?;
        let settings = Self::settings_from(&http, config)?;

        Ok(Self {
            http,
            settings: ArcSwap::from_pointee(settings),
            tally: Arc::new(FailureTally::new(config.breaker.failure_threshold)),
            model_version: ArcSwapOption::empty(),
        })
    }

    fn settings_from(http: &reqwest::Client, config: &ProxyConfig) -> Result<ServiceSettings, SetupError> {
        Ok(ServiceSettings {
            client: MlClient::new(http.clone(), &config.upstream.base_url)?,
            timeouts: TimeoutPolicy::from_config(&config.timeouts),
            degraded_mode: config.breaker.degraded_mode,
            scale: config.predictions.probability_scale,
        })
    }

    /// Swap in settings from a reloaded config. The tally keeps its count.
    pub fn apply_config(&self, config: &ProxyConfig) -> Result<(), SetupError> {
        let settings = Self::settings_from(&self.http, config)?;
        tracing::info!(
            ml_service_url = %settings.client.base_url(),
            degraded_mode = ?settings.degraded_mode,
            scale = ?settings.scale,
            "Prediction settings reloaded"
        );
        self.settings.store(Arc::new(settings));
        self.tally.set_threshold(config.breaker.failure_threshold);
        Ok(())
    }

    /// Override deadlines, keeping everything else.
    pub fn set_timeouts(&self, timeouts: TimeoutPolicy) {
        let mut settings = ServiceSettings::clone(&self.settings.load());
        settings.timeouts = timeouts;
        self.settings.store(Arc::new(settings));
    }

    pub fn settings(&self) -> Arc<ServiceSettings> {
        self.settings.load_full()
    }

    pub fn tally(&self) -> &Arc<FailureTally> {
        &self.tally
    }

    /// Model version most recently reported by the ML service.
    pub fn last_model_version(&self) -> Option<Arc<String>> {
        self.model_version.load_full()
    }

    fn note_model_version(&self, version: &str) {
        if version.is_empty() || version == UNREPORTED_MODEL_VERSION {
            return;
        }
        let current = self.model_version.load();
        if current.as_deref().map(String::as_str) != Some(version) {
            tracing::info!(model_version = version, "ML model version observed");
            self.model_version.store(Some(Arc::new(version.to_string())));
        }
    }

    /// Predict a single fixture.
    pub async fn submit(
        &self,
        request: &PredictionRequest,
        request_id: Option<&str>,
    ) -> Result<Prediction, ServiceError> {
        let input = validate_prediction(request).inspect_err(|_| {
            metrics::record_prediction("predict", "rejected");
        })?;
        let settings = self.settings.load_full();

        if self.tally.is_tripped() {
            tracing::warn!(
                request_id = request_id.unwrap_or("-"),
                home_team = %input.fixture.home_team,
                away_team = %input.fixture.away_team,
                "ML service marked down, serving degraded prediction"
            );
            metrics::record_prediction("predict", "degraded");
            return Ok(Prediction {
                result: settings.degraded_mode.answer(&input.fixture).to_scale(settings.scale),
                degraded: true,
                insights: None,
            });
        }

        let started = Instant::now();
        let outcome = with_deadline(
            &settings.timeouts,
            CallKind::Predict,
            settings.client.predict(&input.fixture, request_id),
        )
        .await;
        metrics::record_upstream_call(CallKind::Predict, outcome.as_ref().err(), started);

        let base = match outcome {
            Ok(result) => {
                self.tally.record_success();
                self.note_model_version(&result.model_version);
                result.normalized()
            }
            Err(e) => {
                self.tally.record_failure();
                tracing::error!(
                    request_id = request_id.unwrap_or("-"),
                    error = %e,
                    failures = self.tally.failure_count(),
                    "Prediction upstream call failed"
                );
                metrics::record_prediction("predict", "failed");
                return Err(e.into());
            }
        };

        let (result, insights) = if input.enable_ai {
            self.enhance(&settings, base, &input.fixture, request_id).await
        } else {
            (base, None)
        };

        metrics::record_prediction("predict", "ok");
        Ok(Prediction {
            result: result.to_scale(settings.scale),
            degraded: false,
            insights,
        })
    }

    async fn enhance(
        &self,
        settings: &ServiceSettings,
        base: PredictionResult,
        fixture: &MatchFixture,
        request_id: Option<&str>,
    ) -> (PredictionResult, Option<Insights>) {
        let started = Instant::now();
        let outcome = with_deadline(
            &settings.timeouts,
            CallKind::Enhance,
            settings.client.enhance(&base, fixture, request_id),
        )
        .await;
        metrics::record_upstream_call(CallKind::Enhance, outcome.as_ref().err(), started);

        match outcome {
            Ok(enhanced) => {
                let result = enhanced
                    .prediction
                    .map(PredictionResult::normalized)
                    .unwrap_or(base);
                (result, Some(enhanced.insights))
            }
            Err(e) => {
                tracing::warn!(
                    request_id = request_id.unwrap_or("-"),
                    error = %e,
                    "AI enhancement failed, returning base prediction"
                );
                (base, None)
            }
        }
    }

    /// Predict a batch in one upstream call.
    pub async fn submit_batch(
        &self,
        request: &BatchRequest,
        request_id: Option<&str>,
    ) -> Result<BatchPrediction, ServiceError> {
        let fixtures = validate_batch(request).inspect_err(|_| {
            metrics::record_prediction("batch", "rejected");
        })?;
        let settings = self.settings.load_full();

        if self.tally.is_tripped() {
            tracing::warn!(
                request_id = request_id.unwrap_or("-"),
                size = fixtures.len(),
                "ML service marked down, serving degraded batch"
            );
            metrics::record_prediction("batch", "degraded");
            let results = fixtures
                .iter()
                .map(|f| settings.degraded_mode.answer(f).to_scale(settings.scale))
                .collect();
            return Ok(BatchPrediction { results, degraded: true });
        }

        let started = Instant::now();
        let outcome = with_deadline(
            &settings.timeouts,
            CallKind::Batch,
            settings.client.predict_batch(&fixtures, request_id),
        )
        .await;
        metrics::record_upstream_call(CallKind::Batch, outcome.as_ref().err(), started);

        match outcome {
            Ok(results) => {
                self.tally.record_success();
                if let Some(first) = results.first() {
                    self.note_model_version(&first.model_version);
                }
                metrics::record_prediction("batch", "ok");
                Ok(BatchPrediction {
                    results: results
                        .into_iter()
                        .map(|r| r.normalized().to_scale(settings.scale))
                        .collect(),
                    degraded: false,
                })
            }
            Err(e) => {
                self.tally.record_failure();
                tracing::error!(
                    request_id = request_id.unwrap_or("-"),
                    size = fixtures.len(),
                    error = %e,
                    "Batch upstream call failed"
                );
                metrics::record_prediction("batch", "failed");
                Err(e.into())
            }
        }
    }

    /// Forward a training set to the ML service.
    pub async fn train(
        &self,
        request: &TrainingRequest,
        request_id: Option<&str>,
    ) -> Result<serde_json::Value, ServiceError> {
        let set = validate_training(request)?;
        let settings = self.settings.load_full();

        tracing::info!(
            request_id = request_id.unwrap_or("-"),
            rows = set.data.len(),
            "Forwarding training set"
        );

        let started = Instant::now();
        let outcome = with_deadline(&settings.timeouts, CallKind::Train, settings.client.train(&set, request_id)).await;
        metrics::record_upstream_call(CallKind::Train, outcome.as_ref().err(), started);

        outcome.map_err(|e| {
            tracing::error!(request_id = request_id.unwrap_or("-"), error = %e, "Training upstream call failed");
            ServiceError::from(e)
        })
    }

    /// Check the ML service health endpoint.
    pub async fn ml_status(&self, request_id: Option<&str>) -> MlStatus {
        let settings = self.settings.load_full();

        let started = Instant::now();
        let health = with_deadline(&settings.timeouts, CallKind::Health, settings.client.health(request_id)).await;
        metrics::record_upstream_call(CallKind::Health, health.as_ref().err(), started);

        if let Ok(body) = &health {
            if let Some(version) = reported_version(body) {
                self.note_model_version(version);
            }
        }

        match &health {
            Ok(_) if self.tally.is_tripped() => {
                tracing::info!("ML service health check succeeded, clearing failure tally");
                self.tally.reset();
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "ML service health check failed"),
        }

        MlStatus {
            health,
            breaker: self.tally.snapshot(),
            degraded_mode: settings.degraded_mode,
        }
    }
}

fn reported_version(health: &serde_json::Value) -> Option<&str> {
    health
        .get("model_version")
        .or_else(|| health.get("version"))
        .and_then(serde_json::Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::types::Outcome;

    // Nothing listens on port 9 on a test host; connections are refused fast.
    fn unreachable_service(threshold: u32) -> PredictionService {
        let mut config = ProxyConfig::default();
        config.upstream.base_url = "http://127.0.0.1:9".into();
        config.breaker.failure_threshold = threshold;
        let service = PredictionService::from_config(&config).unwrap();
        service.set_timeouts(TimeoutPolicy::default().with(CallKind::Predict, std::time::Duration::from_secs(2)));
        service
    }

    fn request(features: Vec<f64>) -> PredictionRequest {
        PredictionRequest {
            home_team: Some("A".into()),
            away_team: Some("B".into()),
            features: Some(features),
            enable_ai: false,
        }
    }

    #[tokio::test]
    async fn test_invalid_request_does_not_count() {
        let service = unreachable_service(3);
        for _ in 0..5 {
            let err = service.submit(&request(vec![1.0, 2.0, 3.0]), None).await.unwrap_err();
            assert!(matches!(err, ServiceError::Invalid(InvalidRequest::FeatureCount { .. })));
        }
        assert_eq!(service.tally().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_failures_trip_into_offline_answers() {
        let service = unreachable_service(3);
        for _ in 0..3 {
            let err = service.submit(&request(vec![0.5; 7]), None).await.unwrap_err();
            assert!(matches!(err, ServiceError::Upstream(_)));
        }
        assert!(service.tally().is_tripped());

        let degraded = service.submit(&request(vec![0.5; 7]), Some("req-1")).await.unwrap();
        assert!(degraded.degraded);
        assert_eq!(degraded.result.prediction, Outcome::Unknown);
        assert!(degraded.result.is_offline());
        assert_eq!(service.tally().failure_count(), 3, "short-circuit does not count");
    }

    #[tokio::test]
    async fn test_tripped_batch_answers_every_item() {
        let service = unreachable_service(1);
        service.tally().record_failure();

        let batch = BatchRequest {
            predictions: Some(vec![request(vec![0.5; 7]), request(vec![0.4; 7])]),
        };
        let result = service.submit_batch(&batch, None).await.unwrap();
        assert!(result.degraded);
        assert_eq!(result.results.len(), 2);
        assert!(result.results.iter().all(PredictionResult::is_offline));
    }

    #[tokio::test]
    async fn test_reload_keeps_count_and_updates_threshold() {
        let service = unreachable_service(5);
        service.tally().record_failure();
        service.tally().record_failure();

        let mut config = ProxyConfig::default();
        config.upstream.base_url = "http://127.0.0.1:19".into();
        config.breaker.failure_threshold = 2;
        service.apply_config(&config).unwrap();

        assert!(service.tally().is_tripped());
        assert_eq!(service.settings().client.base_url(), "http://127.0.0.1:19");
    }

    #[tokio::test]
    async fn test_reload_with_bad_url_is_setup_error_and_keeps_settings() {
        let service = unreachable_service(3);

        let mut config = ProxyConfig::default();
        config.upstream.base_url = "::not a url::".into();
        let err = service.apply_config(&config).unwrap_err();

        assert!(matches!(err, SetupError::InvalidBaseUrl { .. }));
        assert_eq!(service.settings().client.base_url(), "http://127.0.0.1:9");
        assert_eq!(service.tally().failure_count(), 0);
    }

    #[test]
    fn test_bad_url_at_startup_is_setup_error() {
        let mut config = ProxyConfig::default();
        config.upstream.base_url = "not a url".into();
        assert!(matches!(
            PredictionService::from_config(&config),
            Err(SetupError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_model_version_tracking_skips_placeholders() {
        let service = unreachable_service(3);
        assert!(service.last_model_version().is_none());

        service.note_model_version(UNREPORTED_MODEL_VERSION);
        service.note_model_version("");
        assert!(service.last_model_version().is_none());

        service.note_model_version("v2.1");
        assert_eq!(service.last_model_version().as_deref().map(String::as_str), Some("v2.1"));

        let health = serde_json::json!({ "status": "ok", "version": "v3" });
        assert_eq!(reported_version(&health), Some("v3"));
        let health = serde_json::json!({ "status": "ok", "model_version": "m1", "version": "x" });
        assert_eq!(reported_version(&health), Some("m1"));
        assert_eq!(reported_version(&serde_json::json!({ "status": "ok" })), None);
    }
}
