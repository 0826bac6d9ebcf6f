use thiserror::Error;

/// Failure taxonomy for the pricing pipeline.
///
/// Within the scrape pipeline these never escape the orchestrator for
/// expected failure modes — they degrade into `PricingResult` notes.
/// They only surface as errors for input validation (before any
/// navigation happens) and at the HTTP boundary, where each variant
/// maps to a status code.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Malformed caller input (bad cert, unusable sheet). Never the site's fault.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Navigation failure, timeout, or a detected challenge page.
    #[error("{0}")]
    TargetUnavailable(String),

    /// Expected selectors are gone — markup drift, update the selectors.
    #[error("{0}")]
    LayoutChanged(String),

    /// The target answered but had nothing to report.
    #[error("{0}")]
    NoDataFound(String),

    /// Anything else. Logged with full context, generic failure to the caller.
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl ScrapeError {
    /// Stable machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ScrapeError::InvalidInput(_) => "INVALID_INPUT",
            ScrapeError::TargetUnavailable(_) => "TARGET_UNAVAILABLE",
            ScrapeError::LayoutChanged(_) => "LAYOUT_CHANGED",
            ScrapeError::NoDataFound(_) => "NO_DATA_FOUND",
            ScrapeError::Unexpected(_) => "UNEXPECTED",
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
