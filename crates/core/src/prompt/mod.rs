//! Prompt rendering. Everything here is pure: the same record and as-of date
//! always produce the same text.

pub mod format;
pub mod suggest;

use crate::domain::technical::{OptionsData, TechnicalDataRecord};
use chrono::NaiveDate;
use suggest::CallSuggestion;

const EARNINGS_WARNING_DAYS: i64 = 14;

fn scoring_rules() -> String {
    [
        "Scoring:",
        "- score is an integer from 0 to 10",
        "- STRONG BUY: score 9-10",
        "- BUY: score 7-8",
        "- HOLD: score 5-6",
        "- AVOID: score 0-4",
    ]
    .join("\n")
}

fn options_rules() -> String {
    [
        "Options data is available. Prefer contracts with:",
        "- implied volatility below 40%",
        "- IV rank below 50",
        "- bid-ask spread below 3%",
        "- open interest above 1000",
        "Penalize the score when liquidity or volatility fall outside these limits.",
    ]
    .join("\n")
}

fn ticker_output_schema(ticker: &str, suggestion: &CallSuggestion) -> String {
    [
        "Respond with ONLY a single JSON object. Do not wrap it in markdown or code fences.".to_string(),
        "Required format:".to_string(),
        "{".to_string(),
        format!("  \"ticker\": \"{ticker}\","),
        "  \"score\": 0,".to_string(),
        "  \"signal\": \"STRONG BUY\" | \"BUY\" | \"HOLD\" | \"AVOID\",".to_string(),
        "  \"callOption\": {".to_string(),
        format!("    \"strikePrice\": \"{}\",", suggestion.strike_price),
        format!("    \"expiration\": \"{}\",", suggestion.expiration),
        "    \"reasoning\": \"one sentence on why this contract\"".to_string(),
        "  },".to_string(),
        "  \"recommendation\": \"2-3 sentences, at most 400 characters\",".to_string(),
        "  \"risks\": [\"risk 1\", \"risk 2\"]".to_string(),
        "}".to_string(),
    ]
    .join("\n")
}

fn batch_output_schema() -> String {
    [
        "Respond with ONLY a single JSON object. Do not wrap it in markdown or code fences.",
        "Required format (one entry per ticker, in the order given):",
        "{",
        "  \"signals\": [",
        "    {",
        "      \"ticker\": \"AAPL\",",
        "      \"score\": 0,",
        "      \"signal\": \"STRONG BUY\" | \"BUY\" | \"HOLD\" | \"AVOID\",",
        "      \"callOption\": {",
        "        \"strikePrice\": \"0.00\",",
        "        \"expiration\": \"Month D, YYYY\",",
        "        \"reasoning\": \"one sentence\"",
        "      },",
        "      \"recommendation\": \"2-3 sentences\"",
        "    }",
        "  ]",
        "}",
    ]
    .join("\n")
}

fn indicator_lines(record: &TechnicalDataRecord) -> Vec<String> {
    vec![
        format!("- RSI (14): {}", format::rsi(record.rsi)),
        format!(
            "- MACD: {} (signal {}, histogram {})",
            format::macd(record.macd),
            format::macd(record.macd_signal),
            format::macd(record.macd_histogram)
        ),
        format!(
            "- SMA 20/50/200: {} / {} / {}",
            format::price(record.sma_20),
            format::price(record.sma_50),
            format::price(record.sma_200)
        ),
        format!(
            "- Bollinger Bands: upper {}, middle {}, lower {}",
            format::price(record.bb_upper),
            format::price(record.bb_middle),
            format::price(record.bb_lower)
        ),
        format!("- Volume ratio (vs 20d avg): {}", format::ratio(record.volume_ratio)),
    ]
}

/// Only the fields that are present are listed.
fn options_lines(options: &OptionsData) -> Vec<String> {
    let mut lines = vec!["OPTIONS DATA:".to_string()];
    if options.strike.is_some() {
        lines.push(format!("- Strike: ${}", format::price(options.strike)));
    }
    if let Some(expiration) = &options.expiration {
        lines.push(format!("- Expiration: {expiration}"));
    }
    if options.implied_volatility.is_some() {
        lines.push(format!(
            "- Implied volatility: {}%",
            format::whole(options.implied_volatility)
        ));
    }
    if options.iv_rank.is_some() {
        lines.push(format!("- IV rank: {}", format::whole(options.iv_rank)));
    }
    if options.bid_ask_spread.is_some() || options.bid_ask_spread_pct.is_some() {
        lines.push(format!(
            "- Bid-ask spread: ${} ({}%)",
            format::price(options.bid_ask_spread),
            format::whole(options.bid_ask_spread_pct)
        ));
    }
    if options.volume.is_some() {
        lines.push(format!("- Volume: {}", format::whole(options.volume)));
    }
    if options.open_interest.is_some() {
        lines.push(format!("- Open interest: {}", format::whole(options.open_interest)));
    }
    if options.delta.is_some() {
        lines.push(format!("- Delta: {}", format::ratio(options.delta)));
    }
    if options.theta.is_some() {
        lines.push(format!("- Theta: {}", format::ratio(options.theta)));
    }
    lines
}

fn earnings_line(days: i64) -> String {
    if (0..=EARNINGS_WARNING_DAYS).contains(&days) {
        format!("EARNINGS: next report in {days} days (inside the {EARNINGS_WARNING_DAYS}-day window; factor in the volatility event)")
    } else {
        format!("EARNINGS: next report in {days} days")
    }
}

/// Prompt for a single ticker in the per-ticker mode.
pub fn render_ticker_prompt(ticker: &str, record: &TechnicalDataRecord, as_of: NaiveDate) -> String {
    let suggestion = CallSuggestion::derive(record.current_price, as_of);

    let mut sections = vec![format!(
        "You are an options-focused equity analyst. Analyze {ticker} as a candidate for buying a call option, using only the technical data below.\n\n\
         STOCK: {ticker}\n\
         Current price: ${}\n\
         Technical score: {}/100",
        format::price(record.current_price),
        format::whole(record.technical_score),
    )];

    sections.push(format!("INDICATORS:\n{}", indicator_lines(record).join("\n")));

    if !record.scoring_reasons.is_empty() {
        let reasons: Vec<String> = record
            .scoring_reasons
            .iter()
            .map(|r| format!("- {r}"))
            .collect();
        sections.push(format!("SCORING REASONS:\n{}", reasons.join("\n")));
    }

    if let Some(days) = record.days_to_earnings {
        sections.push(earnings_line(days));
    }

    if let Some(options) = &record.options_data {
        sections.push(options_lines(options).join("\n"));
        sections.push(options_rules());
    }

    sections.push(format!(
        "SUGGESTED CALL:\n- Strike (10% OTM): ${}\n- Target expiration: {}",
        suggestion.strike_price, suggestion.expiration
    ));
    sections.push(scoring_rules());
    sections.push(ticker_output_schema(ticker, &suggestion));

    sections.join("\n\n")
}

/// One combined prompt covering every ticker, for the batch mode.
pub fn render_batch_prompt(tickers: &[String], records: &[TechnicalDataRecord]) -> String {
    let mut sections = vec![format!(
        "You are an options-focused equity analyst. Analyze these {} stocks as candidates for buying call options, using only the technical data below.",
        tickers.len()
    )];

    for (ticker, record) in tickers.iter().zip(records) {
        let mut block = vec![format!(
            "STOCK: {ticker}\nCurrent price: ${}\nTechnical score: {}/100",
            format::price(record.current_price),
            format::whole(record.technical_score),
        )];
        block.extend(indicator_lines(record));
        if let Some(options) = &record.options_data {
            block.extend(options_lines(options));
        }
        sections.push(block.join("\n"));
    }

    if records.iter().any(|r| r.options_data.is_some()) {
        sections.push(options_rules());
    }
    sections.push(
        "For each stock suggest a call option roughly 10% out of the money expiring about 3 months out."
            .to_string(),
    );
    sections.push(scoring_rules());
    sections.push(batch_output_schema());

    sections.join("\n\n")
}
