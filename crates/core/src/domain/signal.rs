use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const NOT_AVAILABLE: &str = "N/A";

/// Categorical trading signal. Anything the model invents outside the four
/// buckets is kept verbatim as `Other` so it still reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalLabel {
    StrongBuy,
    Buy,
    Hold,
    Avoid,
    Error,
    Other(String),
}

impl SignalLabel {
    pub fn as_str(&self) -> &str {
        match self {
            SignalLabel::StrongBuy => "STRONG BUY",
            SignalLabel::Buy => "BUY",
            SignalLabel::Hold => "HOLD",
            SignalLabel::Avoid => "AVOID",
            SignalLabel::Error => "ERROR",
            SignalLabel::Other(s) => s,
        }
    }

    /// Case-insensitive; `_` and `-` count as spaces.
    pub fn from_label(raw: &str) -> Self {
        let normalized = raw
            .trim()
            .replace(&['_', '-'][..], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match normalized.as_str() {
            "STRONG BUY" => SignalLabel::StrongBuy,
            "BUY" => SignalLabel::Buy,
            "HOLD" => SignalLabel::Hold,
            "AVOID" => SignalLabel::Avoid,
            "ERROR" => SignalLabel::Error,
            _ => SignalLabel::Other(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for SignalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SignalLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SignalLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SignalLabel::from_label(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOption {
    pub strike_price: String,
    pub expiration: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub ticker: String,
    pub score: i64,
    pub signal: SignalLabel,
    pub call_option: CallOption,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_score: Option<f64>,
}

impl Signal {
    /// Placeholder for a ticker whose gateway call or reply parsing failed.
    pub fn error(ticker: &str, technical_score: Option<f64>, cause: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            score: 0,
            signal: SignalLabel::Error,
            call_option: CallOption {
                strike_price: NOT_AVAILABLE.to_string(),
                expiration: NOT_AVAILABLE.to_string(),
                reasoning: "Analysis failed".to_string(),
            },
            recommendation: format!("Analysis failed: {cause}"),
            risks: Some(Vec::new()),
            technical_score,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub strong_buy: usize,
    pub buy: usize,
    pub hold: usize,
    pub avoid: usize,
    pub errors: usize,
}

/// Response of the per-ticker mode.
#[derive(Debug, Clone, Serialize)]
pub struct PerTickerResponse {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub signals: Vec<Signal>,
    pub summary: Summary,
    pub cost_estimate: String,
}

/// Response of the single-prompt batch mode.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub signals: Vec<Signal>,
    pub analysis_timestamp: DateTime<Utc>,
    pub model_used: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    PerTicker(PerTickerResponse),
    Batch(BatchResponse),
}
