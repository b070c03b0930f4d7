pub mod anthropic;
pub mod error;
pub mod json;

use crate::llm::error::GatewayError;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
    pub stop_reason: Option<String>,
}

/// A chat-completion backend. Model, token limit and temperature are fixed per
/// client; callers only supply the single user prompt.
#[async_trait::async_trait]
pub trait LlmGateway: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<Completion, GatewayError>;
}
