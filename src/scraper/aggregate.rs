use crate::models::SaleRecord;
use chrono::{DateTime, Duration, Utc};

/// Aggregated comp statistics for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct CompStats {
    /// Simple arithmetic mean, rounded to cents. No weighting, no
    /// outlier rejection.
    pub average: Option<f64>,
    /// Comps with both price and date inside the window.
    pub in_window: usize,
    /// Records that yielded a price at all.
    pub total_parsed: usize,
    pub note: String,
}

/// Filter to the trailing window and average.
///
/// `now` is injected rather than read from the wall clock so window
/// boundaries are testable; `window_days` is policy, not a computed
/// property.
pub fn aggregate_sales(records: &[SaleRecord], now: DateTime<Utc>, window_days: i64) -> CompStats {
    let cutoff = now - Duration::days(window_days);

    let total_parsed = records.iter().filter(|r| r.price.is_some()).count();
    let prices: Vec<f64> = records
        .iter()
        .filter_map(|r| match (r.price, r.observed_at) {
            (Some(p), Some(d)) if d >= cutoff => Some(p),
            _ => None,
        })
        .collect();

    if prices.is_empty() {
        let note = if total_parsed > 0 {
            format!("{total_parsed} comps parsed, none within {window_days} days")
        } else {
            "no comps in window".to_string()
        };
        return CompStats {
            average: None,
            in_window: 0,
            total_parsed,
            note,
        };
    }

    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    CompStats {
        average: Some(round_cents(mean)),
        in_window: prices.len(),
        total_parsed,
        note: String::new(),
    }
}

fn round_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ── Tests ─────────────────────────────────────────────────────────────────────
