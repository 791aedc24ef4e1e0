//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Prediction request:
//!     → circuit_breaker.rs (tripped? answer degraded, skip the network)
//!     → timeouts.rs (enforce per-call deadline)
//!     → circuit_breaker.rs (success resets, failure increments)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries and no backoff inside a request; retrying is the caller's call
//! - The tally is an injected object, never a process global

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{FailureTally, TallySnapshot};
pub use timeouts::{with_deadline, CallKind, TimeoutPolicy};
