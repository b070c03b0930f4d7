use crate::analysis::AnalysisRequest;
use crate::domain::technical::TechnicalDataRecord;
use crate::error::AnalysisError;
use serde_json::Value;

/// Validates a raw request body. Runs before any gateway call, so a rejected
/// request costs nothing.
pub fn validate_body(body: &[u8]) -> Result<AnalysisRequest, AnalysisError> {
    let value = serde_json::from_slice::<Value>(body)
        .map_err(|e| AnalysisError::invalid(format!("request body is not valid JSON: {e}")))?;
    validate_request(value)
}

pub fn validate_request(value: Value) -> Result<AnalysisRequest, AnalysisError> {
    let Value::Object(mut body) = value else {
        return Err(AnalysisError::invalid("request body must be a JSON object"));
    };

    let tickers = match body.remove("tickers") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(AnalysisError::invalid("tickers must be an array of strings")),
        None => return Err(AnalysisError::invalid("tickers is required")),
    };
    if tickers.is_empty() {
        return Err(AnalysisError::invalid("tickers must not be empty"));
    }
    let tickers = tickers
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(AnalysisError::invalid(format!(
                "tickers[{idx}] must be a non-empty string"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let records = match body.remove("technical_data") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(AnalysisError::invalid("technical_data must be an array")),
        None => return Err(AnalysisError::invalid("technical_data is required")),
    };
    if records.len() != tickers.len() {
        return Err(AnalysisError::invalid(format!(
            "technical_data has {} entries but tickers has {}",
            records.len(),
            tickers.len()
        )));
    }

    let mut technical_data = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        if !record.is_object() {
            return Err(AnalysisError::invalid(format!(
                "technical_data[{idx}] must be an object"
            )));
        }
        let record = serde_json::from_value::<TechnicalDataRecord>(record).map_err(|e| {
            AnalysisError::invalid(format!("technical_data[{idx}] is malformed: {e}"))
        })?;

        if let Some(own) = record.ticker.as_deref() {
            if !own.eq_ignore_ascii_case(&tickers[idx]) {
                tracing::warn!(
                    ticker = %tickers[idx],
                    record_ticker = %own,
                    "technical_data ticker differs from tickers list; using tickers list"
                );
            }
        }
        technical_data.push(record);
    }

    Ok(AnalysisRequest {
        tickers,
        technical_data,
    })
}
