//! Scripted [`PageSession`] for pipeline tests — no browser involved.

use crate::error::{ScrapeError, ScrapeResult};
use crate::scraper::driver::{PageSession, RowFetch};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct FakeSession {
    pub body: String,
    pub title: String,
    /// row selector → scripted fetch results
    pub tables: HashMap<String, Vec<RowFetch>>,
    /// element selector → inner text (also makes fill/click/wait succeed)
    pub elements: HashMap<String, String>,
    pub fail_goto: Option<String>,
    pub closed: AtomicBool,
}

impl FakeSession {
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn add_table(&mut self, selector: &str, rows: Vec<RowFetch>) {
        self.tables.insert(selector.to_string(), rows);
    }

    pub fn add_element(&mut self, selector: &str, text: &str) {
        self.elements.insert(selector.to_string(), text.to_string());
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn goto(&self, _url: &str) -> ScrapeResult<()> {
        match &self.fail_goto {
            Some(msg) => Err(ScrapeError::TargetUnavailable(msg.clone())),
            None => Ok(()),
        }
    }

    async fn body_text(&self) -> ScrapeResult<String> {
        Ok(self.body.clone())
    }

    async fn title(&self) -> ScrapeResult<String> {
        Ok(self.title.clone())
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> ScrapeResult<bool> {
        Ok(self.tables.contains_key(selector) || self.elements.contains_key(selector))
    }

    async fn row_texts(&self, selector: &str, cap: usize) -> ScrapeResult<Vec<RowFetch>> {
        let mut rows = self.tables.get(selector).cloned().unwrap_or_default();
        rows.truncate(cap);
        Ok(rows)
    }

    async fn fill(&self, selector: &str, _value: &str) -> ScrapeResult<()> {
        if self.elements.contains_key(selector) {
            Ok(())
        } else {
            Err(ScrapeError::LayoutChanged(format!(
                "element not found: {selector}"
            )))
        }
    }

    async fn click(&self, selector: &str) -> ScrapeResult<()> {
        self.fill(selector, "").await
    }

    async fn element_text(&self, selector: &str) -> ScrapeResult<Option<String>> {
        Ok(self
            .elements
            .get(selector)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    async fn close(&self) -> ScrapeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
