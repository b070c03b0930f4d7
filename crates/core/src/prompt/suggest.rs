use crate::prompt::format;
use chrono::{Months, NaiveDate};

const OTM_STRIKE_MULTIPLIER: f64 = 1.10;
const TARGET_EXPIRATION_MONTHS: u32 = 3;

/// Call contract suggested to the model alongside the indicators: 10% out of the
/// money, roughly three months out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSuggestion {
    pub strike_price: String,
    pub expiration: String,
}

impl CallSuggestion {
    pub fn derive(current_price: Option<f64>, as_of: NaiveDate) -> Self {
        Self {
            strike_price: format::price(current_price.map(|p| p * OTM_STRIKE_MULTIPLIER)),
            expiration: target_expiration(as_of),
        }
    }
}

/// `as_of` plus three months, e.g. `January 18, 2027`. The day is clamped to the
/// end of shorter months.
pub fn target_expiration(as_of: NaiveDate) -> String {
    as_of
        .checked_add_months(Months::new(TARGET_EXPIRATION_MONTHS))
        .unwrap_or(as_of)
        .format("%B %-d, %Y")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn strike_is_ten_percent_out_of_the_money() {
        let s = CallSuggestion::derive(Some(100.0), date(2026, 10, 18));
        assert_eq!(s.strike_price, "110.00");

        let s = CallSuggestion::derive(Some(200.0), date(2026, 10, 18));
        assert_eq!(s.strike_price, "220.00");
    }

    #[test]
    fn missing_price_has_no_strike() {
        let s = CallSuggestion::derive(None, date(2026, 10, 18));
        assert_eq!(s.strike_price, "N/A");
    }

    #[test]
    fn expiration_is_three_months_out() {
        assert_eq!(target_expiration(date(2026, 10, 18)), "January 18, 2027");
        assert_eq!(target_expiration(date(2026, 11, 30)), "February 28, 2027");
    }
}
