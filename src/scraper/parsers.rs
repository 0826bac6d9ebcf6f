use crate::models::SaleRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

// ── Price ─────────────────────────────────────────────────────────────────────

/// Parse a sale price out of loosely-structured text.
///
/// Thousands separators are stripped first. A currency-anchored amount
/// wins ("Sold for $1,234.56" → 1234.56); otherwise the first bare
/// decimal-or-integer number is used. `None` when no numeric token exists.
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.replace(',', "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(i) = s.find('$') {
        if let Some(v) = first_number(&s[i + 1..]) {
            return Some(v);
        }
    }
    first_number(s)
}

/// First digit run (with optional decimal part) in the text.
fn first_number(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let start = bytes.iter().position(|b| b.is_ascii_digit())?;
    let mut end = start;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b if b.is_ascii_digit() => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    s[start..end].trim_end_matches('.').parse().ok()
}

// ── Date ──────────────────────────────────────────────────────────────────────

/// Parse a sold date: "Jan 5, 2026" / ISO / "01/05/2026" / RFC 3339.
///
/// Naive results are assumed UTC; offset-carrying results are converted
/// to UTC. Never panics; `None` on anything unrecognised.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    // Sold-listing rows prefix the date cell: "Sold: Jan 5, 2026"
    let s = s
        .strip_prefix("Sold")
        .or_else(|| s.strip_prefix("sold"))
        .unwrap_or(s)
        .trim_start_matches([':', '-', ' '])
        .trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }

    for fmt in ["%b %d, %Y", "%B %d, %Y", "%Y-%m-%d", "%m/%d/%Y", "%d %b %Y", "%b %d %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?));
        }
    }

    None
}

// ── Grade ─────────────────────────────────────────────────────────────────────

/// First 1–2 digit run in the cell ("PSA 10" → "10", "9.5" → "9").
pub fn parse_grade(s: &str) -> Option<String> {
    let start = s.bytes().position(|b| b.is_ascii_digit())?;
    let run: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .take(2)
        .collect();
    Some(run)
}

// ── Block detector ────────────────────────────────────────────────────────────

/// Phrasing that bot-challenge pages use. A challenge page often still
/// satisfies a "table exists" probe with zero meaningful rows, so this
/// scan runs before any selector search.
const BLOCK_MARKERS: &[&str] = &[
    "verify you are human",
    "are you a robot",
    "unusual traffic",
    "access denied",
    "captcha",
    "rate limit",
    "too many requests",
    "attention required",
    "checking your browser",
    "pardon our interruption",
];

pub fn is_block_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    BLOCK_MARKERS.iter().any(|m| lower.contains(m))
}

// ── Row → SaleRecord ──────────────────────────────────────────────────────────

/// Parse one table row's raw inner text into a comp.
///
/// Rows render as newline/tab-separated cells. The first cell that parses
/// as a date becomes `observed_at`; the first currency-marked cell becomes
/// the price. A single-cell row still gets the bare-number fallback.
pub fn parse_sale_row(text: &str) -> SaleRecord {
    let segs: Vec<&str> = text
        .split(['\n', '\t'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let observed_at = segs.iter().find_map(|s| parse_date(s));
    let price = segs
        .iter()
        .filter(|s| s.contains('$'))
        .find_map(|s| parse_price(s))
        .or_else(|| {
            if segs.len() == 1 {
                parse_price(text)
            } else {
                None
            }
        });

    SaleRecord { observed_at, price }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
