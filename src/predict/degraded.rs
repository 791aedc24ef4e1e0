//! Degraded-mode answers served while the breaker is tripped.

use crate::predict::types::{
    DegradedMode, MatchFixture, Outcome, PredictionResult, Probabilities, RULE_BASED_MODEL_VERSION,
};

const RULE_BASED_CONFIDENCE: f64 = 0.6;

impl DegradedMode {
    /// Answer for one fixture without calling the model.
    pub fn answer(self, fixture: &MatchFixture) -> PredictionResult {
        match self {
            DegradedMode::Offline => PredictionResult::offline(),
            DegradedMode::RuleBased => rule_based(fixture),
        }
    }
}

// features[0] and features[1] are the home and away strength ratings
fn rule_based(fixture: &MatchFixture) -> PredictionResult {
    let home_favoured = fixture.features[0] > fixture.features[1];
    let (prediction, probabilities) = if home_favoured {
        (
            Outcome::Home,
            Probabilities { home: RULE_BASED_CONFIDENCE, draw: 0.0, away: 1.0 - RULE_BASED_CONFIDENCE },
        )
    } else {
        (
            Outcome::Away,
            Probabilities { home: 1.0 - RULE_BASED_CONFIDENCE, draw: 0.0, away: RULE_BASED_CONFIDENCE },
        )
    };

    PredictionResult {
        prediction,
        confidence: RULE_BASED_CONFIDENCE,
        probabilities,
        model_version: RULE_BASED_MODEL_VERSION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::types::FEATURE_COUNT;

    fn fixture(home: f64, away: f64) -> MatchFixture {
        let mut features = [0.5; FEATURE_COUNT];
        features[0] = home;
        features[1] = away;
        MatchFixture {
            home_team: "A".into(),
            away_team: "B".into(),
            features,
        }
    }

    #[test]
    fn test_offline_placeholder() {
        let result = DegradedMode::Offline.answer(&fixture(0.9, 0.1));
        assert_eq!(result.prediction, Outcome::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.probabilities.sum(), 0.0);
        assert!(result.is_offline());
    }

    #[test]
    fn test_rule_based_picks_stronger_side() {
        let home = DegradedMode::RuleBased.answer(&fixture(0.8, 0.4));
        assert_eq!(home.prediction, Outcome::Home);
        assert_eq!(home.model_version, "rule-based-v1");

        // ties go to the away side
        let away = DegradedMode::RuleBased.answer(&fixture(0.5, 0.5));
        assert_eq!(away.prediction, Outcome::Away);
        assert!((away.probabilities.sum() - 1.0).abs() < 1e-9);
    }
}
