//! Prediction domain.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → validation.rs (shape and feature checks, no network)
//!     → service.rs (tally check, ML call under deadline, tally update)
//!         → degraded.rs (answer while the tally is tripped)
//!     → types.rs (results normalized to unit scale, converted at egress)
//! ```

pub mod degraded;
pub mod service;
pub mod types;
pub mod validation;

pub use service::{MlStatus, PredictionService, ServiceError, ServiceSettings};
pub use types::{
    BatchPrediction, BatchSummary, DegradedMode, MatchFixture, Outcome, Prediction, PredictionResult,
    Probabilities, ProbabilityScale, FEATURE_COUNT,
};
pub use validation::InvalidRequest;
