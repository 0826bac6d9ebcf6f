use crate::error::ScrapeResult;
use crate::scraper::driver::{PageSession, RowFetch};
use std::time::Duration;
use tracing::debug;

/// Ordered row-selector candidates for the sold-listings results table.
/// The first is the site's current markup; the rest are progressively
/// looser fallbacks so a class rename doesn't zero out a whole batch.
pub const ROW_SELECTORS: &[&str] = &[
    "table#salesTable tbody tr",
    "table.sales-results tbody tr",
    "div.results table tbody tr",
    "table tbody tr",
];

/// A located results table: raw row texts plus which selector won
/// (recorded for diagnostics) and how many rows were skipped.
#[derive(Debug, Clone)]
pub struct TableScan {
    pub rows: Vec<String>,
    pub selector: &'static str,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Found(TableScan),
    /// No candidate matched within its wait. The last selector-level
    /// error, if any, feeds the notes field.
    NotFound { last_error: Option<String> },
}

/// Try each selector candidate in priority order, stopping at the first
/// that yields at least one row. Row text is capped at `cap` rows to
/// bound parse cost against enormous result sets.
pub async fn find_sales_rows(
    session: &dyn PageSession,
    selector_wait: Duration,
    cap: usize,
) -> ScrapeResult<ScanOutcome> {
    let mut last_error = None;

    for (i, selector) in ROW_SELECTORS.iter().enumerate() {
        // Full wait only on the primary selector; fallbacks get a quick
        // probe since the page is already settled by then.
        let wait = if i == 0 {
            selector_wait
        } else {
            Duration::from_millis(500).min(selector_wait)
        };

        match session.wait_for(selector, wait).await {
            Ok(true) => {
                let fetched = session.row_texts(selector, cap).await?;
                let mut rows = Vec::new();
                let mut skipped = 0usize;
                for f in fetched {
                    match f {
                        RowFetch::Text(t) => rows.push(t),
                        RowFetch::Skip(reason) => {
                            debug!(selector, reason, "skipping row");
                            skipped += 1;
                        }
                    }
                }
                if !rows.is_empty() {
                    debug!(selector, rows = rows.len(), skipped, "results table located");
                    return Ok(ScanOutcome::Found(TableScan {
                        rows,
                        selector,
                        skipped,
                    }));
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!(selector, error = %e, "selector probe failed");
                last_error = Some(e.to_string());
            }
        }
    }

    Ok(ScanOutcome::NotFound { last_error })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
