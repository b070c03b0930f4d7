use crate::domain::signal::NOT_AVAILABLE;

/// Fixed-precision rendering; `None` always becomes `N/A`, never `0`.
pub fn fixed(value: Option<f64>, decimals: usize) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{v:.decimals$}"),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn price(value: Option<f64>) -> String {
    fixed(value, 2)
}

pub fn rsi(value: Option<f64>) -> String {
    fixed(value, 1)
}

pub fn macd(value: Option<f64>) -> String {
    fixed(value, 4)
}

pub fn ratio(value: Option<f64>) -> String {
    fixed(value, 2)
}

/// Percentages, scores and counts.
pub fn whole(value: Option<f64>) -> String {
    fixed(value, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_per_kind() {
        assert_eq!(price(Some(201.456)), "201.46");
        assert_eq!(rsi(Some(55.04)), "55.0");
        assert_eq!(macd(Some(0.123456)), "0.1235");
        assert_eq!(ratio(Some(1.5)), "1.50");
        assert_eq!(whole(Some(79.6)), "80");
    }

    #[test]
    fn missing_values_render_as_not_available() {
        for rendered in [price(None), rsi(None), macd(None), ratio(None), whole(None)] {
            assert_eq!(rendered, "N/A");
        }
        assert_eq!(price(Some(f64::NAN)), "N/A");
        assert_eq!(ratio(Some(f64::INFINITY)), "N/A");
    }
}
