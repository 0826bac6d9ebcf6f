use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub pricing: PricingConfig,
    pub server: ServerConfig,
}

/// Scraper / page-driver configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// WebDriver endpoint the page driver connects to.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_sales_base_url")]
    pub sales_base_url: String,

    #[serde(default = "default_estimate_url")]
    pub estimate_url: String,

    #[serde(default = "default_nav_timeout_secs")]
    pub nav_timeout_secs: u64,

    #[serde(default = "default_selector_wait_secs")]
    pub selector_wait_secs: u64,

    /// Wait for client-rendered content before inspecting the page.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Politeness throttle between batch rows.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

/// Comp aggregation policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
    /// Trailing window for the average, in days.
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Max table rows parsed per query.
    #[serde(default = "default_row_cap")]
    pub row_cap: usize,

    #[serde(default)]
    pub grade_label: GradeLabel,
}

/// How a grade is labelled in the search query. Source variants disagree,
/// so this is policy rather than a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeLabel {
    /// Always format as `PSA <n>`.
    #[default]
    Psa,
    /// Use the row's grader column when present, bare number otherwise.
    Grader,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}
fn default_sales_base_url() -> String {
    "https://130point.com/sales/".to_string()
}
fn default_estimate_url() -> String {
    "https://www.gamestop.com/graded-trading-cards/estimate".to_string()
}
fn default_nav_timeout_secs() -> u64 {
    20
}
fn default_selector_wait_secs() -> u64 {
    10
}
fn default_settle_delay_ms() -> u64 {
    1000
}
fn default_request_delay_ms() -> u64 {
    1500
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_window_days() -> i64 {
    90
}
fn default_row_cap() -> usize {
    200
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("CARDCOMPS").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig {
                webdriver_url: default_webdriver_url(),
                sales_base_url: default_sales_base_url(),
                estimate_url: default_estimate_url(),
                nav_timeout_secs: default_nav_timeout_secs(),
                selector_wait_secs: default_selector_wait_secs(),
                settle_delay_ms: default_settle_delay_ms(),
                request_delay_ms: default_request_delay_ms(),
                jitter_ms: default_jitter_ms(),
            },
            pricing: PricingConfig {
                window_days: default_window_days(),
                row_cap: default_row_cap(),
                grade_label: GradeLabel::default(),
            },
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
        }
    }
}
