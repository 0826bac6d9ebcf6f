use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

// ── Sale comp ─────────────────────────────────────────────────────────────────

/// One extracted comparable sale from the results table.
///
/// A row contributing neither a valid price nor a date is discarded
/// before aggregation. A record with a price but no date is retained
/// (it counts toward `total_parsed`) but excluded from the trailing
/// window computation.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub observed_at: Option<DateTime<Utc>>,
    pub price: Option<f64>,
}

// ── Pricing query ─────────────────────────────────────────────────────────────

/// A search query for the sold-listings site. Built once per row/request,
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingQuery {
    pub raw_text: String,
    pub url: String,
}

// ── Pricing result ────────────────────────────────────────────────────────────

/// Output of one scrape run.
///
/// Invariants: `average_price.is_some()` implies `comp_count > 0`, and
/// `comp_count == 0` implies a non-empty `notes` explaining why.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PricingResult {
    /// Simple mean of in-window comps, rounded to cents.
    pub average_price: Option<f64>,
    /// Comps with both a price and a date inside the trailing window.
    pub comp_count: usize,
    /// Rows that yielded a price at all, in-window or not.
    pub total_parsed: usize,
    pub notes: String,
    pub url_used: String,
}

impl PricingResult {
    /// Well-formed result for any aborted scrape. Callers never see an
    /// exception for expected failure modes, only this.
    pub fn aborted(url: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            average_price: None,
            comp_count: 0,
            total_parsed: 0,
            notes: notes.into(),
            url_used: url.into(),
        }
    }
}

// ── GameStop estimate ─────────────────────────────────────────────────────────

/// Single-lookup result from the graded-card estimate tool.
#[derive(Debug, Clone, Serialize)]
pub struct GamestopEstimate {
    pub cert_id: String,
    pub card_name: Option<String>,
    pub grade: Option<String>,
    pub cash_offer: Option<f64>,
    pub credit_offer: Option<f64>,
    pub currency: String,
    pub fetched_at: DateTime<Utc>,
    /// Raw on-page strings backing the typed fields above.
    pub raw_fields: BTreeMap<String, Option<String>>,
}
