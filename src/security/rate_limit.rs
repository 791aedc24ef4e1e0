//! Per-client rate limiting for prediction routes.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, now: Instant, capacity: f64, per_second: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * per_second).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared limiter state, keyed by client IP.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<IpAddr, TokenBucket>,
    enabled: bool,
    capacity: f64,
    per_second: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            enabled: config.enabled,
            capacity: config.burst_size.max(1) as f64,
            per_second: config.requests_per_minute as f64 / 60.0,
        }
    }

    /// Take one token for `client`.
    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }
        let mut bucket = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_acquire(now, self.capacity, self.per_second)
    }

    /// Drop buckets that have refilled completely; they carry no state.
    pub fn prune(&self) {
        let now = Instant::now();
        let full_after = if self.per_second > 0.0 {
            self.capacity / self.per_second
        } else {
            f64::INFINITY
        };
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.last_update).as_secs_f64() < full_after);
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Middleware rejecting clients over their budget with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    // Without connection info (in-process callers) there is no client to key on.
    let Some(client) = client else {
        return next.run(request).await;
    };

    if limiter.check(client) {
        return next.run(request).await;
    }

    let route = request.uri().path().to_string();
    tracing::warn!(client = %client, route = %route, "Rate limit exceeded");
    metrics::record_rate_limited(&route);
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "success": false, "error": "Rate limit exceeded" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(per_minute: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute: per_minute,
            burst_size: burst,
        })
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = limiter(60, 3);
        let client: IpAddr = "10.0.0.1".parse().unwrap();
        let now = Instant::now();

        assert!(limiter.check_at(client, now));
        assert!(limiter.check_at(client, now));
        assert!(limiter.check_at(client, now));
        assert!(!limiter.check_at(client, now));

        // one token per second at 60/min
        assert!(limiter.check_at(client, now + Duration::from_millis(1100)));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(60, 1);
        let now = Instant::now();
        assert!(limiter.check_at("10.0.0.1".parse().unwrap(), now));
        assert!(limiter.check_at("10.0.0.2".parse().unwrap(), now));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_disabled_always_allows() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: false,
            ..Default::default()
        });
        let client: IpAddr = "10.0.0.1".parse().unwrap();
        for _ in 0..1000 {
            assert!(limiter.check(client));
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
