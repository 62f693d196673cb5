//! Client side of the server's interval calculation.
//!
//! The backend measures RTT to the target site and answers with the instant
//! at which a refresh should be issued. The countdown treats the answer as
//! opaque apart from `optimal_refresh_time`.

pub mod client;
pub mod models;

pub use client::HttpIntervalClient;
pub use models::{IntervalCalculationResult, IntervalRequest};

/// Errors from one interval calculation attempt. Any of them makes the
/// calculation unavailable for the alarm that asked.
#[derive(Debug, thiserror::Error)]
pub enum IntervalError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("interval endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("interval calculation rejected: {0}")]
    Rejected(String),
}

/// Source of interval calculations. The HTTP client is the production
/// implementation; tests substitute scripted ones.
#[async_trait::async_trait]
pub trait IntervalCalculator: Send + Sync {
    async fn calculate(
        &self,
        request: &IntervalRequest,
    ) -> Result<IntervalCalculationResult, IntervalError>;
}
