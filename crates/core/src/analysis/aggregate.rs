use crate::domain::signal::{Signal, SignalLabel, Summary};

/// Highest score first. `sort_by` is stable, so equal scores keep their input order.
pub fn sort_by_score_desc(signals: &mut [Signal]) {
    signals.sort_by(|a, b| b.score.cmp(&a.score));
}

pub fn summarize(signals: &[Signal]) -> Summary {
    let mut summary = Summary {
        total: signals.len(),
        ..Default::default()
    };
    for signal in signals {
        match signal.signal {
            SignalLabel::StrongBuy => summary.strong_buy += 1,
            SignalLabel::Buy => summary.buy += 1,
            SignalLabel::Hold => summary.hold += 1,
            SignalLabel::Avoid => summary.avoid += 1,
            SignalLabel::Error => summary.errors += 1,
            SignalLabel::Other(_) => {}
        }
    }
    summary
}

pub fn format_cost(usd: f64) -> String {
    format!("${:.2}", if usd.is_finite() { usd.max(0.0) } else { 0.0 })
}
