//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → body limit (tower-http, configured in server.rs)
//!     → rate_limit.rs (per-IP token bucket on prediction routes)
//!     → handler
//!     → headers.rs (security response headers)
//! ```
//!
//! # Design Decisions
//! - Rate limiting only guards routes that reach the ML service
//! - Health and status routes stay unthrottled for health checks

pub mod headers;
pub mod rate_limit;

pub use headers::apply_security_headers;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
