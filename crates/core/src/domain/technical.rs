use crate::domain::lenient;
use serde::{Deserialize, Serialize};

/// Precomputed indicator snapshot for one ticker, as supplied by the upstream
/// technical-analysis job.
///
/// Every numeric field is `Option`: upstream payloads routinely omit values or send
/// `null`/garbage, and the prompt renders each `None` as `N/A`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalDataRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub ticker: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub current_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub technical_score: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    pub rsi: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub macd: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub macd_signal: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub macd_histogram: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sma_20: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sma_50: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sma_200: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub bb_upper: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub bb_middle: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub bb_lower: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub volume_ratio: Option<f64>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub scoring_reasons: Vec<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub options_data: Option<OptionsData>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub days_to_earnings: Option<i64>,
}

/// Near-the-money call contract quote attached to a ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsData {
    #[serde(default, deserialize_with = "lenient::number")]
    pub strike: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub expiration: Option<String>,
    /// Percent, e.g. `35.0` for 35%.
    #[serde(default, deserialize_with = "lenient::number")]
    pub implied_volatility: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub iv_rank: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub bid_ask_spread: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub bid_ask_spread_pct: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub open_interest: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub delta: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub theta: Option<f64>,
}
