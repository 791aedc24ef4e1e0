//! Request validation.
//!
//! Runs before the breaker is consulted; a rejected request never reaches
//! the network and never counts as an upstream failure.

use thiserror::Error;

use crate::predict::types::{
    BatchRequest, MatchFixture, PredictionInput, PredictionRequest, TrainingRequest, TrainingSet,
    FEATURE_COUNT,
};

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRequest {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("features must contain exactly {expected} numbers, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("feature at index {index} is not a finite number")]
    NonFiniteFeature { index: usize },

    #[error("predictions[{index}]: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<InvalidRequest>,
    },

    #[error("invalid training data: {0}")]
    Training(String),

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Validate a single prediction request.
pub fn validate_prediction(request: &PredictionRequest) -> Result<PredictionInput, InvalidRequest> {
    let home_team = required_text(request.home_team.as_deref(), "homeTeam")?;
    let away_team = required_text(request.away_team.as_deref(), "awayTeam")?;
    let features = request
        .features
        .as_deref()
        .ok_or(InvalidRequest::MissingField("features"))?;

    Ok(PredictionInput {
        fixture: MatchFixture {
            home_team,
            away_team,
            features: feature_vector(features)?,
        },
        enable_ai: request.enable_ai,
    })
}

/// Validate every item of a batch; the first failure is reported with its index.
pub fn validate_batch(request: &BatchRequest) -> Result<Vec<MatchFixture>, InvalidRequest> {
    let items = request
        .predictions
        .as_ref()
        .ok_or(InvalidRequest::MissingField("predictions"))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            validate_prediction(item)
                .map(|input| input.fixture)
                .map_err(|e| InvalidRequest::BatchItem {
                    index,
                    source: Box::new(e),
                })
        })
        .collect()
}

/// Validate a training payload.
pub fn validate_training(request: &TrainingRequest) -> Result<TrainingSet, InvalidRequest> {
    let rows = request.data.as_ref().ok_or(InvalidRequest::MissingField("data"))?;
    let labels = request
        .labels
        .as_ref()
        .ok_or(InvalidRequest::MissingField("labels"))?;

    if rows.is_empty() {
        return Err(InvalidRequest::Training("data must not be empty".into()));
    }
    if rows.len() != labels.len() {
        return Err(InvalidRequest::Training(format!(
            "{} rows but {} labels",
            rows.len(),
            labels.len()
        )));
    }

    let data = rows
        .iter()
        .enumerate()
        .map(|(row, values)| {
            feature_vector(values).map_err(|e| InvalidRequest::Training(format!("row {row}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TrainingSet {
        data,
        labels: labels.clone(),
    })
}

fn required_text(value: Option<&str>, field: &'static str) -> Result<String, InvalidRequest> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(InvalidRequest::MissingField(field)),
    }
}

fn feature_vector(values: &[f64]) -> Result<[f64; FEATURE_COUNT], InvalidRequest> {
    let features: [f64; FEATURE_COUNT] =
        values
            .try_into()
            .map_err(|_| InvalidRequest::FeatureCount {
                expected: FEATURE_COUNT,
                actual: values.len(),
            })?;

    if let Some(index) = features.iter().position(|v| !v.is_finite()) {
        return Err(InvalidRequest::NonFiniteFeature { index });
    }
    Ok(features)
}
