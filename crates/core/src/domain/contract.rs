use crate::domain::lenient;
use crate::domain::signal::{CallOption, Signal, SignalLabel, NOT_AVAILABLE};
use crate::prompt::suggest::CallSuggestion;
use anyhow::ensure;
use serde::{Deserialize, Serialize};

const MAX_RECOMMENDATION_CHARS: usize = 600;
const MAX_RISKS: usize = 5;

/// Signal object as the model writes it. Only loosely typed: every field may be
/// missing or malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSignal {
    #[serde(default, deserialize_with = "lenient::string")]
    pub ticker: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub signal: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub call_option: Option<LlmCallOption>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub recommendation: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmCallOption {
    #[serde(default, deserialize_with = "lenient::display_string")]
    pub strike_price: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub expiration: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub reasoning: Option<String>,
}

/// Reply shape of the batch prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmBatchSignals {
    pub signals: Vec<LlmSignal>,
}

/// What the caller knows about the ticker, independent of the model's reply.
#[derive(Debug, Clone, Default)]
pub struct SignalContext<'a> {
    pub ticker: &'a str,
    pub technical_score: Option<f64>,
    pub suggestion: Option<&'a CallSuggestion>,
    /// Per-ticker replies carry risks and the technical score; batch replies don't.
    pub detailed: bool,
}

impl LlmSignal {
    pub fn validate_and_into_signal(self, ctx: &SignalContext<'_>) -> anyhow::Result<Signal> {
        ensure!(
            self.signal.is_some() || self.score.is_some(),
            "reply has neither a signal label nor a score"
        );

        let score = self.score.map(|s| s.round() as i64).unwrap_or(0);
        let signal = match self.signal.as_deref() {
            Some(label) => SignalLabel::from_label(label),
            None => label_for_score(score),
        };
        ensure!(
            signal != SignalLabel::Error,
            "reply used the reserved ERROR label"
        );

        let (default_strike, default_expiration) = match ctx.suggestion {
            Some(s) => (s.strike_price.clone(), s.expiration.clone()),
            None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
        };
        let call = self.call_option.unwrap_or_default();
        let call_option = CallOption {
            strike_price: call.strike_price.unwrap_or(default_strike),
            expiration: call.expiration.unwrap_or(default_expiration),
            reasoning: call.reasoning.unwrap_or_default(),
        };

        let recommendation = truncate_chars(
            self.recommendation.as_deref().unwrap_or_default(),
            MAX_RECOMMENDATION_CHARS,
        );

        let (risks, technical_score) = if ctx.detailed {
            (
                Some(self.risks.into_iter().take(MAX_RISKS).collect()),
                ctx.technical_score,
            )
        } else {
            (None, None)
        };

        Ok(Signal {
            ticker: ctx.ticker.to_string(),
            score,
            signal,
            call_option,
            recommendation,
            risks,
            technical_score,
        })
    }
}

/// Bucket used when the model omits the label but gives a score.
pub fn label_for_score(score: i64) -> SignalLabel {
    match score {
        s if s >= 9 => SignalLabel::StrongBuy,
        7..=8 => SignalLabel::Buy,
        5..=6 => SignalLabel::Hold,
        _ => SignalLabel::Avoid,
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => trimmed[..idx].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}
