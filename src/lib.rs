//! Football match prediction proxy.
//!
//! Sits between clients and an external ML inference service. Requests are
//! validated locally, forwarded under per-call deadlines, and answered from
//! a degraded strategy once consecutive upstream failures reach a threshold.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod predict;
pub mod resilience;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use predict::PredictionService;
