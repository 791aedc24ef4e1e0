//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::predict::types::{DegradedMode, ProbabilityScale};

/// Root configuration for the prediction proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// External ML service location.
    pub upstream: UpstreamConfig,

    /// Outbound and inbound timeouts.
    pub timeouts: TimeoutConfig,

    /// Consecutive-failure breaker settings.
    pub breaker: BreakerConfig,

    /// Result presentation.
    pub predictions: PredictionConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
        }
    }
}

/// ML service location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the ML service; endpoint paths are appended to it.
    pub base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration for each kind of call, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Single prediction call.
    pub predict_secs: u64,

    /// Batch prediction call.
    pub batch_secs: u64,

    /// AI enhancement call.
    pub enhance_secs: u64,

    /// Model training call.
    pub train_secs: u64,

    /// Health check.
    pub health_secs: u64,

    /// Upper bound on any inbound request, including all upstream work.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            predict_secs: 10,
            batch_secs: 30,
            enhance_secs: 10,
            train_secs: 60,
            health_secs: 3,
            request_secs: 90,
        }
    }
}

/// Breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive upstream failures before degraded mode is entered.
    pub failure_threshold: u32,

    /// What callers receive while degraded.
    pub degraded_mode: DegradedMode,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            degraded_mode: DegradedMode::Offline,
        }
    }
}

/// Prediction output settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PredictionConfig {
    /// Scale used for `confidence` and `probabilities` in responses.
    pub probability_scale: ProbabilityScale,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting on prediction routes.
    pub enabled: bool,

    /// Sustained requests per minute per client IP.
    pub requests_per_minute: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 30,
            burst_size: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error or a full EnvFilter string).
    pub log_level: String,

    /// Human readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:3002".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.upstream.base_url, "http://0.0.0.0:8000");
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.timeouts.predict_secs, 10);
        assert_eq!(config.timeouts.batch_secs, 30);
        assert_eq!(config.predictions.probability_scale, ProbabilityScale::Unit);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [breaker]
            degraded_mode = "rule_based"

            [predictions]
            probability_scale = "percent"
            "#,
        )
        .unwrap();
        assert_eq!(config.breaker.degraded_mode, DegradedMode::RuleBased);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.predictions.probability_scale, ProbabilityScale::Percent);
    }
}
