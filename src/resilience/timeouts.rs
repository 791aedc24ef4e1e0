//! Timeout enforcement.
//!
//! Every outbound call to the ML service has a deadline. A deadline firing
//! drops the in-flight request and is reported as `UpstreamError::Timeout`,
//! which the breaker counts like any other failure.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::upstream::UpstreamError;

/// Kinds of outbound call, each with its own deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Predict,
    Batch,
    Enhance,
    Train,
    Health,
}

impl CallKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::Predict => "predict",
            CallKind::Batch => "batch",
            CallKind::Enhance => "enhance",
            CallKind::Train => "train",
            CallKind::Health => "health",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deadlines per call kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    predict: Duration,
    batch: Duration,
    enhance: Duration,
    train: Duration,
    health: Duration,
}

impl TimeoutPolicy {
    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self {
            predict: Duration::from_secs(config.predict_secs),
            batch: Duration::from_secs(config.batch_secs),
            enhance: Duration::from_secs(config.enhance_secs),
            train: Duration::from_secs(config.train_secs),
            health: Duration::from_secs(config.health_secs),
        }
    }

    pub fn for_call(&self, kind: CallKind) -> Duration {
        match kind {
            CallKind::Predict => self.predict,
            CallKind::Batch => self.batch,
            CallKind::Enhance => self.enhance,
            CallKind::Train => self.train,
            CallKind::Health => self.health,
        }
    }

    /// Override one deadline (used by tests to avoid waiting on real defaults).
    pub fn with(mut self, kind: CallKind, deadline: Duration) -> Self {
        match kind {
            CallKind::Predict => self.predict = deadline,
            CallKind::Batch => self.batch = deadline,
            CallKind::Enhance => self.enhance = deadline,
            CallKind::Train => self.train = deadline,
            CallKind::Health => self.health = deadline,
        }
        self
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::from_config(&TimeoutConfig::default())
    }
}

/// Run `fut` under the deadline for `kind`.
pub async fn with_deadline<T, F>(policy: &TimeoutPolicy, kind: CallKind, fut: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    let deadline = policy.for_call(kind);
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout { call: kind, after: deadline }),
    }
}
