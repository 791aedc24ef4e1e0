//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, threshold >= 1)
//! - Validate addresses and the upstream URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.base_url: {0}")]
    InvalidUpstreamUrl(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("timeouts.request_secs ({request}) must exceed every upstream timeout (largest is {largest})")]
    RequestTimeoutTooShort { request: u64, largest: u64 },

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::InvalidUpstreamUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        ))),
        Err(e) => errors.push(ValidationError::InvalidUpstreamUrl(e.to_string())),
    }

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroValue("breaker.failure_threshold"));
    }

    let t = &config.timeouts;
    for (name, value) in [
        ("timeouts.predict_secs", t.predict_secs),
        ("timeouts.batch_secs", t.batch_secs),
        ("timeouts.enhance_secs", t.enhance_secs),
        ("timeouts.train_secs", t.train_secs),
        ("timeouts.health_secs", t.health_secs),
        ("timeouts.request_secs", t.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(name));
        }
    }

    // predict + enhance run back to back inside one inbound request
    let largest = t
        .batch_secs
        .max(t.train_secs)
        .max(t.predict_secs + t.enhance_secs)
        .max(t.health_secs);
    if t.request_secs > 0 && t.request_secs <= largest {
        errors.push(ValidationError::RequestTimeoutTooShort {
            request: t.request_secs,
            largest,
        });
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_minute == 0 {
            errors.push(ValidationError::ZeroValue("rate_limit.requests_per_minute"));
        }
        if config.rate_limit.burst_size == 0 {
            errors.push(ValidationError::ZeroValue("rate_limit.burst_size"));
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroValue("security.max_body_size"));
    }

    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if config.admin.enabled {
        check_address("admin.bind_address", &config.admin.bind_address, &mut errors);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.upstream.base_url = "ftp://ml:21".into();
        config.breaker.failure_threshold = 0;
        config.timeouts.health_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4, "{:?}", errors);
        assert!(errors.contains(&ValidationError::ZeroValue("breaker.failure_threshold")));
        assert!(errors.contains(&ValidationError::ZeroValue("timeouts.health_secs")));
    }

    #[test]
    fn test_request_timeout_must_cover_upstream_calls() {
        let mut config = ProxyConfig::default();
        config.timeouts.request_secs = 20;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::RequestTimeoutTooShort { request: 20, largest: 60 }]
        );
    }

    #[test]
    fn test_admin_requires_key() {
        let mut config = ProxyConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "  ".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingAdminKey]);
    }
}
