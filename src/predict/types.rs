//! Prediction data model.
//!
//! Inbound bodies keep every field optional so that validation can say
//! exactly which constraint was violated; validated values are fixed-size.

use serde::{Deserialize, Serialize};

/// Number of features the ML model expects, in order.
pub const FEATURE_COUNT: usize = 7;

/// Model version reported by the offline placeholder.
pub const OFFLINE_MODEL_VERSION: &str = "offline";

/// Model version recorded when the ML service omits one.
pub const UNREPORTED_MODEL_VERSION: &str = "unreported";

/// Model version reported by the rule-based fallback.
pub const RULE_BASED_MODEL_VERSION: &str = "rule-based-v1";

/// Predicted match outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Outcome {
    Home,
    Draw,
    Away,
    Unknown,
}

impl From<String> for Outcome {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "home" | "home_win" | "h" | "1" => Outcome::Home,
            "draw" | "d" | "x" => Outcome::Draw,
            "away" | "away_win" | "a" | "2" => Outcome::Away,
            _ => Outcome::Unknown,
        }
    }
}

/// Outcome probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Probabilities {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Probabilities {
    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            home: f(self.home),
            draw: f(self.draw),
            away: f(self.away),
        }
    }
}

/// Scale for `confidence` and `probabilities` in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityScale {
    /// `[0, 1]`
    #[default]
    Unit,
    /// `[0, 100]`
    Percent,
}

impl ProbabilityScale {
    pub fn factor(self) -> f64 {
        match self {
            ProbabilityScale::Unit => 1.0,
            ProbabilityScale::Percent => 100.0,
        }
    }
}

/// What callers receive while the breaker is tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DegradedMode {
    /// `unknown` outcome with zero confidence and `model_version: "offline"`.
    #[default]
    Offline,
    /// Home if the first feature beats the second, else away.
    RuleBased,
}

/// A prediction as produced by the ML service or a fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: Outcome,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub probabilities: Probabilities,
    #[serde(default = "unreported_version")]
    pub model_version: String,
}

fn unreported_version() -> String {
    UNREPORTED_MODEL_VERSION.to_string()
}

impl PredictionResult {
    /// Placeholder returned while degraded.
    pub fn offline() -> Self {
        Self {
            prediction: Outcome::Unknown,
            confidence: 0.0,
            probabilities: Probabilities::default(),
            model_version: OFFLINE_MODEL_VERSION.to_string(),
        }
    }

    /// True for placeholders that did not come from the model.
    pub fn is_offline(&self) -> bool {
        self.model_version == OFFLINE_MODEL_VERSION
    }

    /// Bring an upstream result onto the unit scale.
    ///
    /// Upstreams are inconsistent; anything whose probabilities sum past 1.5
    /// or whose confidence exceeds 1 is read as percent.
    pub fn normalized(self) -> Self {
        let percent = self.probabilities.sum() > 1.5 || self.confidence > 1.0;
        let divisor = if percent { 100.0 } else { 1.0 };
        let clamp = |v: f64| {
            let v = v / divisor;
            if v.is_finite() {
                v.clamp(0.0, 1.0)
            } else {
                0.0
            }
        };
        Self {
            confidence: clamp(self.confidence),
            probabilities: self.probabilities.map(clamp),
            ..self
        }
    }

    /// Convert a unit-scale result to the presentation scale.
    pub fn to_scale(self, scale: ProbabilityScale) -> Self {
        let factor = scale.factor();
        Self {
            confidence: self.confidence * factor,
            probabilities: self.probabilities.map(|v| v * factor),
            ..self
        }
    }
}

/// Inbound single prediction body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    #[serde(default)]
    pub features: Option<Vec<f64>>,
    #[serde(default, rename = "enableAI")]
    pub enable_ai: bool,
}

/// Inbound batch body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub predictions: Option<Vec<PredictionRequest>>,
}

/// Inbound training body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingRequest {
    #[serde(default)]
    pub data: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub labels: Option<Vec<i64>>,
}

/// A validated fixture, in the shape the ML service expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFixture {
    pub home_team: String,
    pub away_team: String,
    pub features: [f64; FEATURE_COUNT],
}

/// A validated single prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionInput {
    pub fixture: MatchFixture,
    pub enable_ai: bool,
}

/// A validated training set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSet {
    pub data: Vec<[f64; FEATURE_COUNT]>,
    pub labels: Vec<i64>,
}

/// Optional decoration returned by the enhance endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategic_advice: Option<serde_json::Value>,
}

/// Outcome of a single prediction call.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub result: PredictionResult,
    /// Set when the breaker answered instead of the model.
    pub degraded: bool,
    pub insights: Option<Insights>,
}

/// Outcome of a batch prediction call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPrediction {
    pub results: Vec<PredictionResult>,
    pub degraded: bool,
}

/// Outcome counts across a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub home_wins: usize,
    pub away_wins: usize,
    pub draws: usize,
    /// Fixtures with a decisive predicted winner.
    pub total_opportunities: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[PredictionResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.prediction {
                Outcome::Home => summary.home_wins += 1,
                Outcome::Away => summary.away_wins += 1,
                Outcome::Draw => summary.draws += 1,
                Outcome::Unknown => {}
            }
        }
        summary.total_opportunities = summary.home_wins + summary.away_wins;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_parses_loosely() {
        let result: PredictionResult = serde_json::from_value(json!({
            "prediction": "HOME_WIN",
            "confidence": 0.7,
            "probabilities": {"home": 0.7, "draw": 0.2, "away": 0.1},
            "model_version": "v2"
        }))
        .unwrap();
        assert_eq!(result.prediction, Outcome::Home);

        let result: PredictionResult =
            serde_json::from_value(json!({"prediction": "something-else"})).unwrap();
        assert_eq!(result.prediction, Outcome::Unknown);
        assert_eq!(result.model_version, "unreported");
    }

    #[test]
    fn test_outcome_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Outcome::Draw).unwrap(), json!("draw"));
        assert_eq!(serde_json::to_value(Outcome::Unknown).unwrap(), json!("unknown"));
    }

    #[test]
    fn test_percent_upstream_is_normalized() {
        let result = PredictionResult {
            prediction: Outcome::Away,
            confidence: 55.0,
            probabilities: Probabilities { home: 20.0, draw: 25.0, away: 55.0 },
            model_version: "v1".into(),
        }
        .normalized();

        assert!((result.confidence - 0.55).abs() < 1e-9);
        assert!((result.probabilities.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_upstream_is_untouched() {
        let original = PredictionResult {
            prediction: Outcome::Home,
            confidence: 0.6,
            probabilities: Probabilities { home: 0.6, draw: 0.25, away: 0.15 },
            model_version: "v1".into(),
        };
        assert_eq!(original.clone().normalized(), original);
    }

    #[test]
    fn test_percent_scale_output() {
        let result = PredictionResult {
            prediction: Outcome::Home,
            confidence: 0.5,
            probabilities: Probabilities { home: 0.5, draw: 0.3, away: 0.2 },
            model_version: "v1".into(),
        }
        .to_scale(ProbabilityScale::Percent);

        assert!((result.confidence - 50.0).abs() < 1e-9);
        assert!((result.probabilities.sum() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_request_wire_names() {
        let request: PredictionRequest = serde_json::from_value(json!({
            "homeTeam": "A",
            "awayTeam": "B",
            "features": [0.1, 0.2],
            "enableAI": true
        }))
        .unwrap();
        assert_eq!(request.home_team.as_deref(), Some("A"));
        assert!(request.enable_ai);

        let fixture = MatchFixture {
            home_team: "A".into(),
            away_team: "B".into(),
            features: [0.0; FEATURE_COUNT],
        };
        let body = serde_json::to_value(&fixture).unwrap();
        assert_eq!(body["homeTeam"], "A");
        assert_eq!(body["features"].as_array().unwrap().len(), FEATURE_COUNT);
    }

    #[test]
    fn test_batch_summary_counts_outcomes() {
        let mut results = vec![PredictionResult::offline(); 5];
        results[0].prediction = Outcome::Home;
        results[1].prediction = Outcome::Home;
        results[2].prediction = Outcome::Away;
        results[3].prediction = Outcome::Draw;

        let summary = BatchSummary::from_results(&results);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.home_wins, 2);
        assert_eq!(summary.away_wins, 1);
        assert_eq!(summary.draws, 1);
        assert_eq!(summary.total_opportunities, 3);

        let body = serde_json::to_value(summary).unwrap();
        assert_eq!(body["homeWins"], 2);
        assert_eq!(body["totalOpportunities"], 3);

        assert_eq!(BatchSummary::from_results(&[]), BatchSummary::default());
    }
}
