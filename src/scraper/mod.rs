pub mod aggregate;
pub mod driver;
pub mod extract;
pub mod parsers;
pub mod query;
#[cfg(test)]
pub mod testkit;

use crate::config::AppConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::{GamestopEstimate, PricingQuery, PricingResult, SaleRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use self::driver::PageSession;
use self::extract::{find_sales_rows, ScanOutcome};

// ── Options ───────────────────────────────────────────────────────────────────

/// Timeouts and policy knobs for one scrape run, lifted out of the full
/// config so tests can shrink the waits.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub settle_delay: Duration,
    pub selector_wait: Duration,
    pub row_cap: usize,
    pub window_days: i64,
}

impl ScrapeOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            settle_delay: Duration::from_millis(config.scraper.settle_delay_ms),
            selector_wait: Duration::from_secs(config.scraper.selector_wait_secs),
            row_cap: config.pricing.row_cap,
            window_days: config.pricing.window_days,
        }
    }
}

// ── Comps orchestrator ────────────────────────────────────────────────────────

/// Drive one query end-to-end: navigate → block check → table search →
/// row extract → aggregate.
///
/// Never returns an error for expected failure modes — every abort path
/// degrades into a well-formed [`PricingResult`] with explanatory notes,
/// so the batch loop and the lookup endpoint have nothing to catch.
pub async fn scrape_comps(
    session: &dyn PageSession,
    query: &PricingQuery,
    opts: &ScrapeOptions,
    now: DateTime<Utc>,
) -> PricingResult {
    info!(query = %query.raw_text, "scraping comps");

    if let Err(e) = session.goto(&query.url).await {
        warn!(url = %query.url, error = %e, "navigation failed");
        return PricingResult::aborted(&query.url, e.to_string());
    }

    // The target renders client-side; give the scripts a moment.
    tokio::time::sleep(opts.settle_delay).await;

    let body = match session.body_text().await {
        Ok(b) => b,
        Err(e) => return PricingResult::aborted(&query.url, format!("page read failed: {e}")),
    };

    // Must run before the table search: a challenge page can still satisfy
    // a "table exists" probe and get misread as zero comps.
    if parsers::is_block_page(&body) {
        let title = session.title().await.unwrap_or_default();
        let snippet: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
        let snippet: String = snippet.chars().take(160).collect();
        warn!(title, "challenge page detected, aborting query");
        return PricingResult::aborted(
            &query.url,
            format!("blocked: challenge page detected (title: {title:?}; body: {snippet})"),
        );
    }

    let scan = match find_sales_rows(session, opts.selector_wait, opts.row_cap).await {
        Ok(ScanOutcome::Found(scan)) => scan,
        Ok(ScanOutcome::NotFound { last_error }) => {
            let notes = match last_error {
                Some(e) => format!("no results table ({e})"),
                None => "no results table".to_string(),
            };
            return PricingResult::aborted(&query.url, notes);
        }
        Err(e) => return PricingResult::aborted(&query.url, format!("table scan failed: {e}")),
    };

    let records: Vec<SaleRecord> = scan
        .rows
        .iter()
        .map(|r| parsers::parse_sale_row(r))
        .filter(|r| r.price.is_some() || r.observed_at.is_some())
        .collect();

    let stats = aggregate::aggregate_sales(&records, now, opts.window_days);

    // Rows found but nothing priced is distinct from "no table at all":
    // markup present but unparsable points at drift, not an empty market.
    let notes = if stats.in_window == 0 {
        if stats.total_parsed == 0 {
            let mut notes = format!("{} rows found but no prices parsed", scan.rows.len());
            if scan.skipped > 0 {
                notes.push_str(&format!("; {} rows skipped", scan.skipped));
            }
            notes
        } else {
            stats.note.clone()
        }
    } else {
        String::new()
    };

    debug!(
        selector = scan.selector,
        comps = stats.in_window,
        parsed = stats.total_parsed,
        skipped = scan.skipped,
        avg = ?stats.average,
        "query complete"
    );

    PricingResult {
        average_price: stats.average,
        comp_count: stats.in_window,
        total_parsed: stats.total_parsed,
        notes,
        url_used: query.url.clone(),
    }
}

// ── GameStop estimate flow ────────────────────────────────────────────────────

// TODO: update these if GameStop changes the estimate page markup.
const CERT_INPUT_SELECTOR: &str = "input[name='psaCert']";
const SUBMIT_SELECTOR: &str = "button[type='submit']";
const RESULT_SELECTOR: &str = "[data-testid='psa-estimate-result']";
const NO_OFFER_SELECTOR: &str = "[data-testid='psa-estimate-no-offer']";
const NO_OFFER_SNIPPET: &str = "no estimate";

/// Look up a cash/credit estimate for one cert.
///
/// `cert` must already be validated ([`query::validate_cert`]) so
/// malformed input never reaches the page driver. Distinguishes
/// `NoDataFound` (explicit no-offer) from `LayoutChanged` (selectors
/// gone) from `TargetUnavailable` (timed out).
pub async fn fetch_estimate(
    session: &dyn PageSession,
    estimate_url: &str,
    cert: &str,
    opts: &ScrapeOptions,
) -> ScrapeResult<GamestopEstimate> {
    info!(cert, "fetching estimate");

    session.goto(estimate_url).await?;
    tokio::time::sleep(opts.settle_delay).await;

    session.fill(CERT_INPUT_SELECTOR, cert).await.map_err(|e| match e {
        ScrapeError::LayoutChanged(_) => {
            ScrapeError::LayoutChanged("cert input field not found; selectors likely outdated".into())
        }
        e => e,
    })?;
    session.click(SUBMIT_SELECTOR).await.map_err(|e| match e {
        ScrapeError::LayoutChanged(_) => {
            ScrapeError::LayoutChanged("submit button not found; selectors likely outdated".into())
        }
        e => e,
    })?;

    // Wait for either the result container or the no-offer marker.
    let step = Duration::from_millis(250);
    let mut waited = Duration::ZERO;
    loop {
        if let Some(text) = session.element_text(NO_OFFER_SELECTOR).await? {
            return Err(ScrapeError::NoDataFound(text));
        }
        if session.wait_for(RESULT_SELECTOR, step).await? {
            break;
        }
        waited += step;
        if waited >= opts.selector_wait {
            return Err(ScrapeError::TargetUnavailable(
                "timed out waiting for estimate result".into(),
            ));
        }
    }

    let body = session.body_text().await?;
    if body.to_lowercase().contains(NO_OFFER_SNIPPET) {
        return Err(ScrapeError::NoDataFound(
            "target did not provide an estimate for this cert".into(),
        ));
    }

    let card_name = session
        .element_text(&format!("{RESULT_SELECTOR} .card-name"))
        .await?;
    let grade = session
        .element_text(&format!("{RESULT_SELECTOR} .card-grade"))
        .await?;
    let cash_offer = session
        .element_text(&format!("{RESULT_SELECTOR} .cash-offer"))
        .await?
        .as_deref()
        .and_then(parsers::parse_price);
    let credit_offer = session
        .element_text(&format!("{RESULT_SELECTOR} .credit-offer"))
        .await?
        .as_deref()
        .and_then(parsers::parse_price);

    let mut raw_fields = BTreeMap::new();
    raw_fields.insert("card_name_raw".to_string(), card_name.clone());
    raw_fields.insert("grade_raw".to_string(), grade.clone());

    Ok(GamestopEstimate {
        cert_id: cert.to_string(),
        card_name,
        grade,
        cash_offer,
        credit_offer,
        currency: "USD".to_string(),
        fetched_at: Utc::now(),
        raw_fields,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::driver::RowFetch;
    use crate::scraper::testkit::FakeSession;

    fn opts() -> ScrapeOptions {
        ScrapeOptions {
            settle_delay: Duration::ZERO,
            selector_wait: Duration::from_millis(10),
            row_cap: 200,
            window_days: 90,
        }
    }

    fn query() -> PricingQuery {
        PricingQuery {
            raw_text: "1986 Fleer Isiah Thomas #109 PSA 10".into(),
            url: "https://example.com/sales/?query=test".into(),
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-06-01T12:00:00Z".parse().unwrap()
    }

    fn row(date: &str, price: &str) -> RowFetch {
        RowFetch::Text(format!("{date}\n1986 Fleer Isiah Thomas #109\n{price}"))
    }

    #[tokio::test]
    async fn test_happy_path_averages_in_window_rows() {
        let mut session = FakeSession::with_body("sold listings for Isiah Thomas");
        session.add_table(
            extract::ROW_SELECTORS[0],
            vec![
                row("May 20, 2026", "$10.00"),  // 12 days ago
                row("Apr 1, 2026", "$20.00"),   // 61 days ago
                row("Feb 21, 2026", "$999.00"), // 100 days ago — outside window
            ],
        );

        let result = scrape_comps(&session, &query(), &opts(), now()).await;
        assert_eq!(result.average_price, Some(15.0));
        assert_eq!(result.comp_count, 2);
        assert_eq!(result.total_parsed, 3);
        assert_eq!(result.notes, "");
        assert_eq!(result.url_used, query().url);
    }

    #[tokio::test]
    async fn test_rows_found_but_unparsable() {
        let mut session = FakeSession::with_body("sold listings");
        session.add_table(
            extract::ROW_SELECTORS[0],
            vec![
                RowFetch::Text("view details\nimage".into()),
                RowFetch::Text("sponsored\nad".into()),
            ],
        );

        let result = scrape_comps(&session, &query(), &opts(), now()).await;
        assert_eq!(result.average_price, None);
        assert_eq!(result.comp_count, 0);
        assert!(result.notes.contains("no prices parsed"));
    }

    #[tokio::test]
    async fn test_skipped_rows_surface_in_notes() {
        let mut session = FakeSession::with_body("sold listings");
        session.add_table(
            extract::ROW_SELECTORS[0],
            vec![
                RowFetch::Text("view details\nimage".into()),
                RowFetch::Skip("stale element".into()),
                RowFetch::Skip("stale element".into()),
            ],
        );

        let result = scrape_comps(&session, &query(), &opts(), now()).await;
        assert_eq!(result.comp_count, 0);
        assert!(result.notes.contains("no prices parsed"));
        assert!(result.notes.contains("2 rows skipped"));
    }

    #[tokio::test]
    async fn test_parsed_but_stale_comps() {
        let mut session = FakeSession::with_body("sold listings");
        session.add_table(
            extract::ROW_SELECTORS[0],
            vec![row("Jan 1, 2025", "$50.00")],
        );

        let result = scrape_comps(&session, &query(), &opts(), now()).await;
        assert_eq!(result.comp_count, 0);
        assert_eq!(result.total_parsed, 1);
        assert!(result.notes.contains("none within 90 days"));
    }

    #[tokio::test]
    async fn test_block_page_aborts_before_table_search() {
        let mut session =
            FakeSession::with_body("Please verify you are human before continuing");
        session.title = "Just a moment...".into();
        // Challenge pages often carry an (empty-looking) table too.
        session.add_table(extract::ROW_SELECTORS[0], vec![row("May 20, 2026", "$10")]);

        let result = scrape_comps(&session, &query(), &opts(), now()).await;
        assert_eq!(result.average_price, None);
        assert!(result.notes.starts_with("blocked:"));
        assert!(result.notes.contains("Just a moment"));
    }

    #[tokio::test]
    async fn test_no_results_table() {
        let session = FakeSession::with_body("nothing matched your search");
        let result = scrape_comps(&session, &query(), &opts(), now()).await;
        assert_eq!(result.comp_count, 0);
        assert!(result.notes.contains("no results table"));
    }

    #[tokio::test]
    async fn test_navigation_failure_degrades_to_notes() {
        let session = FakeSession {
            fail_goto: Some("navigation error: dns failure".into()),
            ..FakeSession::default()
        };
        let result = scrape_comps(&session, &query(), &opts(), now()).await;
        assert_eq!(result.average_price, None);
        assert!(result.notes.contains("navigation error"));
    }

    // ── Estimate flow ────────────────────────────────────────────────────

    fn estimate_session() -> FakeSession {
        let mut session = FakeSession::with_body("PSA estimate tool");
        session.add_element(CERT_INPUT_SELECTOR, "");
        session.add_element(SUBMIT_SELECTOR, "");
        session
    }

    #[tokio::test]
    async fn test_estimate_happy_path() {
        let mut session = estimate_session();
        session.add_element(RESULT_SELECTOR, "result");
        session.add_element(&format!("{RESULT_SELECTOR} .card-name"), "1986 Fleer Jordan");
        session.add_element(&format!("{RESULT_SELECTOR} .card-grade"), "PSA 10");
        session.add_element(&format!("{RESULT_SELECTOR} .cash-offer"), "$1,500.00");
        session.add_element(&format!("{RESULT_SELECTOR} .credit-offer"), "$1,800.00");

        let est = fetch_estimate(&session, "https://example.com/estimate", "12345678", &opts())
            .await
            .unwrap();
        assert_eq!(est.cert_id, "12345678");
        assert_eq!(est.card_name.as_deref(), Some("1986 Fleer Jordan"));
        assert_eq!(est.cash_offer, Some(1500.0));
        assert_eq!(est.credit_offer, Some(1800.0));
        assert_eq!(est.currency, "USD");
        assert_eq!(
            est.raw_fields.get("grade_raw"),
            Some(&Some("PSA 10".to_string()))
        );
    }

    #[tokio::test]
    async fn test_estimate_no_offer() {
        let mut session = estimate_session();
        session.add_element(NO_OFFER_SELECTOR, "We can't make an offer on this card");

        let err = fetch_estimate(&session, "https://example.com/estimate", "12345678", &opts())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::NoDataFound(_)));
    }

    #[tokio::test]
    async fn test_estimate_missing_input_is_layout_drift() {
        let session = FakeSession::with_body("totally redesigned page");
        let err = fetch_estimate(&session, "https://example.com/estimate", "12345678", &opts())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::LayoutChanged(_)));
    }

    #[tokio::test]
    async fn test_estimate_timeout_when_nothing_appears() {
        let session = estimate_session();
        let err = fetch_estimate(&session, "https://example.com/estimate", "12345678", &opts())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::TargetUnavailable(_)));
    }
}
