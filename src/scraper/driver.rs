use crate::error::{ScrapeError, ScrapeResult};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use std::time::Duration;
use tracing::debug;

/// Per-row text fetch outcome. A stale or detached row is a `Skip`, never
/// a raised-and-caught exception — one bad row must not abort a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFetch {
    Text(String),
    Skip(String),
}

/// The page-driver capability: navigation, DOM querying, text extraction.
///
/// The production impl wraps a WebDriver session; tests script a fake.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn goto(&self, url: &str) -> ScrapeResult<()>;
    async fn body_text(&self) -> ScrapeResult<String>;
    async fn title(&self) -> ScrapeResult<String>;
    /// True when the selector matches at least one element within `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> ScrapeResult<bool>;
    /// Inner text of up to `cap` elements matching `selector`.
    async fn row_texts(&self, selector: &str, cap: usize) -> ScrapeResult<Vec<RowFetch>>;
    async fn fill(&self, selector: &str, value: &str) -> ScrapeResult<()>;
    async fn click(&self, selector: &str) -> ScrapeResult<()>;
    /// Trimmed text of the first match, `None` when absent or unreadable.
    async fn element_text(&self, selector: &str) -> ScrapeResult<Option<String>>;
    async fn close(&self) -> ScrapeResult<()>;
}

// ── WebDriver impl ───────────────────────────────────────────────────────────

pub struct WebDriverSession {
    client: Client,
    nav_timeout: Duration,
}

impl WebDriverSession {
    pub async fn connect(webdriver_url: &str, nav_timeout: Duration) -> ScrapeResult<Self> {
        debug!(url = webdriver_url, "connecting to webdriver");
        let client = ClientBuilder::native()
            .connect(webdriver_url)
            .await
            .map_err(|e| {
                ScrapeError::TargetUnavailable(format!("webdriver connect failed: {e}"))
            })?;
        Ok(Self { client, nav_timeout })
    }

    async fn find(&self, selector: &str) -> ScrapeResult<fantoccini::elements::Element> {
        self.client
            .find(Locator::Css(selector))
            .await
            .map_err(|e| {
                if e.is_no_such_element() {
                    ScrapeError::LayoutChanged(format!("element not found: {selector}"))
                } else {
                    cmd_err(e)
                }
            })
    }
}

fn cmd_err(e: CmdError) -> ScrapeError {
    match e {
        e if e.is_no_such_element() => ScrapeError::LayoutChanged(e.to_string()),
        CmdError::WaitTimeout => ScrapeError::TargetUnavailable("wait timed out".into()),
        e => ScrapeError::Unexpected(e.to_string()),
    }
}

#[async_trait]
impl PageSession for WebDriverSession {
    async fn goto(&self, url: &str) -> ScrapeResult<()> {
        match tokio::time::timeout(self.nav_timeout, self.client.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::TargetUnavailable(format!(
                "navigation error: {e}"
            ))),
            Err(_) => Err(ScrapeError::TargetUnavailable(format!(
                "navigation timed out after {:?}",
                self.nav_timeout
            ))),
        }
    }

    async fn body_text(&self) -> ScrapeResult<String> {
        let body = self.find("body").await?;
        body.text().await.map_err(cmd_err)
    }

    async fn title(&self) -> ScrapeResult<String> {
        let value = self
            .client
            .execute("return document.title;", vec![])
            .await
            .map_err(cmd_err)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> ScrapeResult<bool> {
        match self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
        {
            Ok(_) => Ok(true),
            Err(CmdError::WaitTimeout) => Ok(false),
            Err(e) => Err(cmd_err(e)),
        }
    }

    async fn row_texts(&self, selector: &str, cap: usize) -> ScrapeResult<Vec<RowFetch>> {
        let elements = self
            .client
            .find_all(Locator::Css(selector))
            .await
            .map_err(cmd_err)?;

        let mut out = Vec::with_capacity(elements.len().min(cap));
        for el in elements.into_iter().take(cap) {
            match el.text().await {
                Ok(t) => out.push(RowFetch::Text(t)),
                // Stale element etc. — the row is skipped, the scan continues.
                Err(e) => out.push(RowFetch::Skip(format!("row text fetch failed: {e}"))),
            }
        }
        Ok(out)
    }

    async fn fill(&self, selector: &str, value: &str) -> ScrapeResult<()> {
        let el = self.find(selector).await?;
        el.clear().await.map_err(cmd_err)?;
        el.send_keys(value).await.map_err(cmd_err)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> ScrapeResult<()> {
        let el = self.find(selector).await?;
        el.click().await.map_err(cmd_err)?;
        Ok(())
    }

    async fn element_text(&self, selector: &str) -> ScrapeResult<Option<String>> {
        match self.client.find(Locator::Css(selector)).await {
            Ok(el) => Ok(el
                .text()
                .await
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(cmd_err(e)),
        }
    }

    async fn close(&self) -> ScrapeResult<()> {
        // Client is a cheap handle onto the session; closing a clone
        // tears the whole session down.
        self.client.clone().close().await.map_err(cmd_err)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
