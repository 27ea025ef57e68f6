use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orbit_common::LabelStrength;

/// What the classifier hands to the oracle: the entity, the current
/// strength-ranked label table (already capped at the budget), and the
/// budget itself.
#[derive(Debug, Clone, Serialize)]
pub struct OracleRequest {
    pub title: String,
    pub candidates: Vec<LabelStrength>,
    pub budget: usize,
}

/// Oracle output: up to three label names and a free-text explanation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OracleResponse {
    /// Chosen category labels, most fitting first (at most 3).
    pub labels: Vec<String>,
    /// One or two sentences on why these labels fit.
    pub explanation: String,
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oracle returned malformed output: {0}")]
    Malformed(String),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// The categorization oracle boundary. Non-deterministic in production
/// (LLM-backed), substituted with a deterministic stub in tests.
#[async_trait]
pub trait CategoryOracle: Send + Sync {
    async fn categorize(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;
}
