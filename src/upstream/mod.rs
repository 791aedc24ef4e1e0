//! External ML service access.
//!
//! # Data Flow
//! ```text
//! PredictionService
//!     → client.rs (JSON over HTTP, x-request-id propagated)
//!     → ML service: /predict, /predict/batch, /enhance, /train, /health
//!     → error.rs (timeout / unreachable / status / invalid response)
//! ```

pub mod client;
pub mod error;

pub use client::{Enhanced, MlClient};
pub use error::{SetupError, UpstreamError};
