use crate::llm::error::{GatewayError, ParseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Client payload failed shape validation. Never reaches the gateway.
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AnalysisError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AnalysisError::InvalidRequest(message.into())
    }
}
