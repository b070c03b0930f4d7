use crate::domain::contract::{LlmBatchSignals, LlmSignal, SignalContext};
use crate::domain::signal::Signal;
use crate::llm::error::ParseError;
use serde_json::Value;

/// Pulls a JSON value out of a model reply. Tried in order: the whole text, the
/// first ```json fenced block, the first balanced `{...}` span, and finally the
/// first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let candidates = [
        fenced_block(trimmed),
        first_balanced_object(trimmed),
        outer_braces(trimmed),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```json").or_else(|| text.find("```"))?;
    let after_open = &text[open + 3..];
    // Skip the info string ("json") up to the end of the fence line.
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn extract_object(text: &str) -> Result<Value, ParseError> {
    let value = extract_json(text).ok_or_else(|| ParseError::new("no JSON object found", text))?;
    if !value.is_object() {
        return Err(ParseError::new("top-level JSON value is not an object", text));
    }
    Ok(value)
}

/// Parses a per-ticker reply into a [`Signal`] for `ctx.ticker`.
pub fn parse_signal(text: &str, ctx: &SignalContext<'_>) -> Result<Signal, ParseError> {
    let value = extract_object(text)?;
    let raw = serde_json::from_value::<LlmSignal>(value)
        .map_err(|e| ParseError::new(format!("unexpected signal shape: {e}"), text))?;
    raw.validate_and_into_signal(ctx)
        .map_err(|e| ParseError::new(format!("{e:#}"), text))
}

/// Parses a batch reply (`{"signals": [...]}`) into one signal per requested
/// ticker, in `tickers` order.
///
/// An entry is matched by its `ticker` field, or by position when it names none.
/// A requested ticker with no usable entry becomes an error signal. Entries for
/// tickers that were never requested are dropped.
pub fn parse_batch(text: &str, tickers: &[String]) -> Result<Vec<Signal>, ParseError> {
    let value = extract_object(text)?;
    let batch = serde_json::from_value::<LlmBatchSignals>(value)
        .map_err(|e| ParseError::new(format!("unexpected batch shape: {e}"), text))?;

    let mut entries: Vec<Option<LlmSignal>> = batch.signals.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(tickers.len());

    for (idx, ticker) in tickers.iter().enumerate() {
        let by_ticker = entries.iter().position(|entry| {
            entry
                .as_ref()
                .and_then(|raw| raw.ticker.as_deref())
                .is_some_and(|named| named.trim().eq_ignore_ascii_case(ticker))
        });
        let by_position = match entries.get(idx) {
            Some(Some(raw)) if raw.ticker.is_none() => Some(idx),
            _ => None,
        };
        let raw = by_ticker
            .or(by_position)
            .and_then(|slot| entries[slot].take());

        let ctx = SignalContext {
            ticker,
            ..Default::default()
        };
        let signal = match raw {
            Some(raw) => match raw.validate_and_into_signal(&ctx) {
                Ok(signal) => signal,
                Err(err) => {
                    tracing::warn!(%ticker, error = %err, "batch entry not usable");
                    batch_error(ticker, &err.to_string())
                }
            },
            None => {
                tracing::warn!(%ticker, "batch reply has no entry for ticker");
                batch_error(ticker, "no signal returned for this ticker")
            }
        };
        out.push(signal);
    }

    for raw in entries.into_iter().flatten() {
        tracing::warn!(ticker = ?raw.ticker, "dropping batch entry for unrequested ticker");
    }
    Ok(out)
}

fn batch_error(ticker: &str, cause: &str) -> Signal {
    let mut signal = Signal::error(ticker, None, cause);
    signal.risks = None;
    signal
}
