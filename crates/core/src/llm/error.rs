use thiserror::Error;

/// Failure of a single call to the model provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("request timed out")]
    Timeout,

    #[error("provider rejected the request: {0}")]
    MalformedRequest(String),

    #[error("provider returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Short machine-readable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Authentication(_) => "authentication",
            GatewayError::RateLimited(_) => "rate_limited",
            GatewayError::Timeout => "timeout",
            GatewayError::MalformedRequest(_) => "malformed_request",
            GatewayError::Upstream { .. } => "upstream",
            GatewayError::Transport(_) => "transport",
            GatewayError::Decode(_) => "decode",
        }
    }
}

/// The model replied, but not with the JSON we asked for.
#[derive(Debug, Clone, Error)]
#[error("model reply is not valid signal JSON: {detail}")]
pub struct ParseError {
    pub detail: String,
    pub raw_output: String,
}

impl ParseError {
    pub fn new(detail: impl Into<String>, raw_output: &str) -> Self {
        Self {
            detail: detail.into(),
            raw_output: raw_output.to_string(),
        }
    }
}
