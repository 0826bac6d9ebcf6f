//! Batch pricing over a CSV sheet.
//!
//! One page-driver session is reused across all rows (cheaper, and a
//! smaller blocking surface for the target), rows run strictly
//! sequentially with a politeness delay in between, and a failed row
//! lands in its Notes cell instead of failing the batch — the caller
//! always gets a complete sheet back.

use crate::config::AppConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::PricingResult;
use crate::scraper::driver::PageSession;
use crate::scraper::query::{ColumnMap, QueryBuilder};
use crate::scraper::{scrape_comps, ScrapeOptions};
use chrono::Utc;
use csv::StringRecord;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Output columns, appended when absent and overwritten in place when a
/// previous run left them behind.
pub const OUTPUT_COLUMNS: [&str; 5] = [
    "Avg Price (90d)",
    "Comps (90d)",
    "Source",
    "Query Used",
    "Notes",
];

pub const SOURCE_LABEL: &str = "130point";

#[derive(Debug, Default)]
pub struct BatchStats {
    pub rows_total: usize,
    pub rows_priced: usize,
    pub rows_without_comps: usize,
}

/// Price every row of the uploaded sheet and return the annotated CSV.
///
/// Only input problems (unreadable file, empty sheet, no identity column)
/// error out — and they do so before any scraping begins. Everything
/// after that always completes.
pub async fn price_sheet(
    session: &dyn PageSession,
    input: &[u8],
    config: &AppConfig,
) -> ScrapeResult<(Vec<u8>, BatchStats)> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader
        .headers()
        .map_err(|e| ScrapeError::InvalidInput(format!("unreadable CSV: {e}")))?
        .clone();

    let cols = ColumnMap::resolve(&headers);
    if !cols.has_identity() {
        return Err(ScrapeError::InvalidInput(
            "no card identity column found (need one of: year, set, player, card number, description)"
                .into(),
        ));
    }

    let records: Vec<StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .map_err(|e| ScrapeError::InvalidInput(format!("unreadable CSV row: {e}")))?;
    if records.is_empty() {
        return Err(ScrapeError::InvalidInput("sheet has no data rows".into()));
    }
    // Short rows are padded later; rows wider than the header would lose
    // cells to the appended output columns, so reject them up front.
    for (i, record) in records.iter().enumerate() {
        if record.len() > headers.len() {
            return Err(ScrapeError::InvalidInput(format!(
                "row {} has {} cells but the header row has {}",
                i + 2,
                record.len(),
                headers.len()
            )));
        }
    }

    // Resolve output column positions once: reuse an existing header,
    // otherwise append.
    let mut out_headers: Vec<String> = headers.iter().map(String::from).collect();
    let mut positions = [0usize; OUTPUT_COLUMNS.len()];
    for (i, name) in OUTPUT_COLUMNS.iter().enumerate() {
        positions[i] = match out_headers.iter().position(|h| h.eq_ignore_ascii_case(name)) {
            Some(p) => p,
            None => {
                out_headers.push(name.to_string());
                out_headers.len() - 1
            }
        };
    }
    let width = out_headers.len();

    let builder = QueryBuilder::new(&config.scraper.sales_base_url, config.pricing.grade_label);
    let opts = ScrapeOptions::from_config(config);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&out_headers)
        .map_err(|e| ScrapeError::Unexpected(format!("CSV write failed: {e}")))?;

    let mut stats = BatchStats {
        rows_total: records.len(),
        ..BatchStats::default()
    };

    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            polite_delay(config).await;
        }

        let query = builder.build_from_row(record, &cols);
        let (raw_text, result) = match &query {
            Some(q) => (
                q.raw_text.clone(),
                scrape_comps(session, q, &opts, Utc::now()).await,
            ),
            None => (
                String::new(),
                PricingResult::aborted("", "row has no usable card identity"),
            ),
        };

        if result.average_price.is_some() {
            stats.rows_priced += 1;
        } else {
            stats.rows_without_comps += 1;
            warn!(row = i + 1, notes = %result.notes, "row priced without comps");
        }

        let mut out: Vec<String> = record.iter().map(String::from).collect();
        out.resize(width, String::new());
        out[positions[0]] = result
            .average_price
            .map(|p| format!("{p:.2}"))
            .unwrap_or_default();
        out[positions[1]] = result.comp_count.to_string();
        out[positions[2]] = SOURCE_LABEL.to_string();
        out[positions[3]] = raw_text;
        out[positions[4]] = result.notes;

        writer
            .write_record(&out)
            .map_err(|e| ScrapeError::Unexpected(format!("CSV write failed: {e}")))?;
    }

    info!(
        rows = stats.rows_total,
        priced = stats.rows_priced,
        without_comps = stats.rows_without_comps,
        "batch complete"
    );

    let bytes = writer
        .into_inner()
        .map_err(|e| ScrapeError::Unexpected(format!("CSV flush failed: {e}")))?;
    Ok((bytes, stats))
}

/// Sleep for the configured inter-row delay + random jitter. Rate-limiting
/// policy, not a correctness mechanism.
async fn polite_delay(config: &AppConfig) {
    let jitter = rand::rng().random_range(0..=config.scraper.jitter_ms);
    let total = Duration::from_millis(config.scraper.request_delay_ms + jitter);
    tokio::time::sleep(total).await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
