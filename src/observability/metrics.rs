//! Metrics collection and exposition.
//!
//! # Metrics
//! - `prediction_requests_total` (counter): requests by route and outcome
//! - `prediction_upstream_duration_seconds` (histogram): ML service latency by call
//! - `prediction_upstream_errors_total` (counter): ML service failures by call and kind
//! - `prediction_breaker_failures` (gauge): current consecutive failure count
//! - `prediction_breaker_trips_total` (counter): times degraded mode was entered
//! - `prediction_rate_limited_total` (counter): rejected by the rate limiter
//!
//! Recording without an installed exporter is a no-op, so tests and
//! deployments with metrics disabled pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::CallKind;
use crate::upstream::UpstreamError;

pub const REQUESTS_TOTAL: &str = "prediction_requests_total";
pub const UPSTREAM_DURATION: &str = "prediction_upstream_duration_seconds";
pub const UPSTREAM_ERRORS_TOTAL: &str = "prediction_upstream_errors_total";
pub const BREAKER_FAILURES: &str = "prediction_breaker_failures";
pub const BREAKER_TRIPS_TOTAL: &str = "prediction_breaker_trips_total";
pub const RATE_LIMITED_TOTAL: &str = "prediction_rate_limited_total";

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(REQUESTS_TOTAL, Unit::Count, "Prediction requests by route and outcome.");
    describe_histogram!(UPSTREAM_DURATION, Unit::Seconds, "ML service call latency.");
    describe_counter!(UPSTREAM_ERRORS_TOTAL, Unit::Count, "Failed ML service calls.");
    describe_gauge!(BREAKER_FAILURES, Unit::Count, "Current consecutive upstream failures.");
    describe_counter!(BREAKER_TRIPS_TOTAL, Unit::Count, "Times the failure threshold was reached.");
    describe_counter!(RATE_LIMITED_TOTAL, Unit::Count, "Requests rejected by the rate limiter.");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_prediction(route: &'static str, outcome: &'static str) {
    counter!(REQUESTS_TOTAL, "route" => route, "outcome" => outcome).increment(1);
}

pub fn record_upstream_call(call: CallKind, error: Option<&UpstreamError>, started: Instant) {
    histogram!(UPSTREAM_DURATION, "call" => call.as_str()).record(started.elapsed().as_secs_f64());
    if let Some(e) = error {
        counter!(UPSTREAM_ERRORS_TOTAL, "call" => call.as_str(), "kind" => e.kind()).increment(1);
    }
}

pub fn record_breaker_failures(failures: u32) {
    gauge!(BREAKER_FAILURES).set(failures as f64);
}

pub fn record_breaker_trip() {
    counter!(BREAKER_TRIPS_TOTAL).increment(1);
}

pub fn record_rate_limited(route: &str) {
    counter!(RATE_LIMITED_TOTAL, "route" => route.to_string()).increment(1);
}
