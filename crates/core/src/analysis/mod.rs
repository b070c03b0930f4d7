pub mod aggregate;
pub mod validate;

use crate::config::Settings;
use crate::domain::contract::SignalContext;
use crate::domain::signal::{AnalysisResponse, BatchResponse, PerTickerResponse, Signal};
use crate::domain::technical::TechnicalDataRecord;
use crate::error::AnalysisError;
use crate::llm::{json, LlmGateway, TokenUsage};
use crate::prompt::{self, suggest::CallSuggestion};
use chrono::{NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// Validated request: `tickers[i]` and `technical_data[i]` describe the same stock.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub tickers: Vec<String>,
    pub technical_data: Vec<TechnicalDataRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnalysisMode {
    /// One prompt and one gateway call per ticker; failures are isolated per ticker.
    #[default]
    PerTicker,
    /// One combined prompt for the whole request.
    Batch,
}

impl FromStr for AnalysisMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_ticker" | "per-ticker" => Ok(AnalysisMode::PerTicker),
            "batch" => Ok(AnalysisMode::Batch),
            other => anyhow::bail!("unknown analysis mode: {other} (expected per_ticker or batch)"),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::PerTicker => f.write_str("per_ticker"),
            AnalysisMode::Batch => f.write_str("batch"),
        }
    }
}

/// Runs one analysis request against `gateway`.
///
/// `as_of` anchors the derived call suggestion (expiration = `as_of` + 3 months).
pub async fn analyze(
    gateway: &dyn LlmGateway,
    settings: &Settings,
    request: &AnalysisRequest,
    mode: AnalysisMode,
    as_of: NaiveDate,
) -> Result<AnalysisResponse, AnalysisError> {
    tracing::info!(
        %mode,
        tickers_len = request.tickers.len(),
        model = gateway.model(),
        "starting analysis"
    );

    match mode {
        AnalysisMode::PerTicker => analyze_per_ticker(gateway, settings, request, as_of)
            .await
            .map(AnalysisResponse::PerTicker),
        AnalysisMode::Batch => analyze_batch(gateway, request)
            .await
            .map(AnalysisResponse::Batch),
    }
}

async fn analyze_per_ticker(
    gateway: &dyn LlmGateway,
    settings: &Settings,
    request: &AnalysisRequest,
    as_of: NaiveDate,
) -> Result<PerTickerResponse, AnalysisError> {
    let mut signals = Vec::with_capacity(request.tickers.len());
    let mut usage = TokenUsage::default();

    // Sequential on purpose: one call finishes (or fails) before the next starts.
    for (ticker, record) in request.tickers.iter().zip(&request.technical_data) {
        let (signal, call_usage) = analyze_ticker(gateway, ticker, record, as_of).await;
        usage += call_usage;
        signals.push(signal);
    }

    aggregate::sort_by_score_desc(&mut signals);
    let summary = aggregate::summarize(&signals);
    let cost = settings.estimate_cost(usage.input_tokens, usage.output_tokens);

    tracing::info!(
        total = summary.total,
        errors = summary.errors,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "per-ticker analysis finished"
    );

    Ok(PerTickerResponse {
        success: true,
        timestamp: Utc::now(),
        model: gateway.model().to_string(),
        signals,
        summary,
        cost_estimate: aggregate::format_cost(cost),
    })
}

/// Never fails: gateway and parse errors become an `ERROR` signal for this ticker.
async fn analyze_ticker(
    gateway: &dyn LlmGateway,
    ticker: &str,
    record: &TechnicalDataRecord,
    as_of: NaiveDate,
) -> (Signal, TokenUsage) {
    let suggestion = CallSuggestion::derive(record.current_price, as_of);
    let prompt = prompt::render_ticker_prompt(ticker, record, as_of);

    let completion = match gateway.complete(&prompt).await {
        Ok(completion) => completion,
        Err(err) => {
            tracing::warn!(%ticker, kind = err.kind(), error = %err, "gateway call failed");
            let signal = Signal::error(ticker, record.technical_score, &err.to_string());
            return (signal, TokenUsage::default());
        }
    };

    let ctx = SignalContext {
        ticker,
        technical_score: record.technical_score,
        suggestion: Some(&suggestion),
        detailed: true,
    };
    let signal = match json::parse_signal(&completion.text, &ctx) {
        Ok(signal) => signal,
        Err(err) => {
            tracing::warn!(
                %ticker,
                error = %err,
                raw_output = %err.raw_output,
                "model reply could not be parsed"
            );
            Signal::error(ticker, record.technical_score, &err.to_string())
        }
    };
    (signal, completion.usage)
}

async fn analyze_batch(
    gateway: &dyn LlmGateway,
    request: &AnalysisRequest,
) -> Result<BatchResponse, AnalysisError> {
    let prompt = prompt::render_batch_prompt(&request.tickers, &request.technical_data);
    let completion = gateway.complete(&prompt).await?;
    let signals = json::parse_batch(&completion.text, &request.tickers)?;

    tracing::info!(
        signals_len = signals.len(),
        input_tokens = completion.usage.input_tokens,
        output_tokens = completion.usage.output_tokens,
        "batch analysis finished"
    );

    Ok(BatchResponse {
        signals,
        analysis_timestamp: Utc::now(),
        model_used: gateway.model().to_string(),
    })
}
