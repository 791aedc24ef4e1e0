//! HTTP client for the external ML service.
//!
//! Calls carry no deadline of their own; callers wrap them with
//! `resilience::with_deadline` so each call kind gets its bound.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::request::X_REQUEST_ID;
use crate::predict::types::{Insights, MatchFixture, PredictionResult, TrainingSet};
use crate::upstream::{SetupError, UpstreamError};

/// Client bound to one ML service base URL.
#[derive(Debug, Clone)]
pub struct MlClient {
    http: Client,
    base_url: String,
}

#[derive(Serialize)]
struct BatchBody<'a> {
    predictions: &'a [MatchFixture],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnhanceContext<'a> {
    home_team: &'a str,
    away_team: &'a str,
}

#[derive(Serialize)]
struct EnhanceBody<'a> {
    prediction: &'a PredictionResult,
    context: EnhanceContext<'a>,
}

/// The predict endpoint answers with a bare result or a `{success, data}` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum PredictPayload {
    Enveloped { data: PredictionResult },
    Bare(PredictionResult),
}

/// The batch endpoint answers with a bare list or one of two wrapper objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum BatchPayload {
    List(Vec<PredictionResult>),
    Wrapped { predictions: Vec<PredictionResult> },
    Results { results: Vec<PredictionResult> },
}

/// Body returned by the enhance endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Enhanced {
    #[serde(default)]
    pub prediction: Option<PredictionResult>,
    #[serde(flatten)]
    pub insights: Insights,
}

impl MlClient {
    /// Create a client for `base_url`, sharing the connection pool of `http`.
    pub fn new(http: Client, base_url: &str) -> Result<Self, SetupError> {
        let parsed = Url::parse(base_url).map_err(|e| SetupError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /predict`
    pub async fn predict(
        &self,
        fixture: &MatchFixture,
        request_id: Option<&str>,
    ) -> Result<PredictionResult, UpstreamError> {
        let payload: PredictPayload = self.post_json("/predict", fixture, request_id).await?;
        Ok(match payload {
            PredictPayload::Enveloped { data } => data,
            PredictPayload::Bare(result) => result,
        })
    }

    /// `POST /predict/batch`
    pub async fn predict_batch(
        &self,
        fixtures: &[MatchFixture],
        request_id: Option<&str>,
    ) -> Result<Vec<PredictionResult>, UpstreamError> {
        let payload: BatchPayload = self
            .post_json("/predict/batch", &BatchBody { predictions: fixtures }, request_id)
            .await?;
        let results = match payload {
            BatchPayload::List(results) => results,
            BatchPayload::Wrapped { predictions } => predictions,
            BatchPayload::Results { results } => results,
        };

        if results.len() != fixtures.len() {
            return Err(UpstreamError::InvalidResponse(format!(
                "batch returned {} results for {} requests",
                results.len(),
                fixtures.len()
            )));
        }
        Ok(results)
    }

    /// `POST /enhance`
    pub async fn enhance(
        &self,
        prediction: &PredictionResult,
        fixture: &MatchFixture,
        request_id: Option<&str>,
    ) -> Result<Enhanced, UpstreamError> {
        let body = EnhanceBody {
            prediction,
            context: EnhanceContext {
                home_team: &fixture.home_team,
                away_team: &fixture.away_team,
            },
        };
        self.post_json("/enhance", &body, request_id).await
    }

    /// `POST /train`
    pub async fn train(
        &self,
        set: &TrainingSet,
        request_id: Option<&str>,
    ) -> Result<serde_json::Value, UpstreamError> {
        self.post_json("/train", set, request_id).await
    }

    /// `GET /health`
    pub async fn health(&self, request_id: Option<&str>) -> Result<serde_json::Value, UpstreamError> {
        let mut request = self.http.get(self.endpoint("/health"));
        if let Some(id) = request_id {
            request = request.header(X_REQUEST_ID, id);
        }
        let response = request.send().await?;
        Self::decode(response).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, request_id: Option<&str>) -> Result<T, UpstreamError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(self.endpoint(path)).json(body);
        if let Some(id) = request_id {
            request = request.header(X_REQUEST_ID, id);
        }

        tracing::debug!(path, request_id = request_id.unwrap_or("-"), "Calling ML service");
        let response = request.send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, UpstreamError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::status(status.as_u16(), &body));
        }

        let bytes = response.bytes().await?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        reject_failed_envelope(&value)?;
        serde_json::from_value(value).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }
}

/// A 2xx body of `{"success": false, ...}` is the service reporting its own failure.
fn reject_failed_envelope(value: &serde_json::Value) -> Result<(), UpstreamError> {
    if value.get("success").and_then(serde_json::Value::as_bool) == Some(false) {
        let reason = value
            .get("error")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("no error given");
        return Err(UpstreamError::InvalidResponse(format!(
            "ML service reported failure: {reason}"
        )));
    }
    Ok(())
}
