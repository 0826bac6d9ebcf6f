//! HTTP surface: single-cert estimate lookup, batch sheet pricing, health.
//!
//! Each request owns its page-driver session exclusively — the lookup
//! endpoint opens and tears down one per call, the batch endpoint one per
//! upload — so concurrent requests need no coordination.

use crate::batch;
use crate::config::AppConfig;
use crate::error::ScrapeError;
use crate::models::GamestopEstimate;
use crate::scraper::driver::{PageSession, WebDriverSession};
use crate::scraper::{self, query, ScrapeOptions};
use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/gamestop/estimate", get(gamestop_estimate))
        .route("/cards/price", post(price_cards))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = router(AppState {
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Error mapping ─────────────────────────────────────────────────────────────

/// HTTP wrapper for the scrape taxonomy: 400 for the caller's fault, 404
/// for an explicit no-answer, 502 for the target's fault, 500 otherwise.
pub struct ApiError(ScrapeError);

impl From<ScrapeError> for ApiError {
    fn from(e: ScrapeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ScrapeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ScrapeError::NoDataFound(_) => StatusCode::NOT_FOUND,
            ScrapeError::LayoutChanged(_) | ScrapeError::TargetUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            ScrapeError::Unexpected(msg) => {
                error!(error = %msg, "unexpected failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = json!({
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        (status, Json(body)).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
struct EstimateParams {
    cert: String,
}

async fn gamestop_estimate(
    State(state): State<AppState>,
    Query(params): Query<EstimateParams>,
) -> Result<Json<GamestopEstimate>, ApiError> {
    // Validation runs before any session is opened.
    let cert = query::validate_cert(&params.cert)?;

    let config = &state.config;
    let session = connect(config).await?;
    let result = scraper::fetch_estimate(
        &session,
        &config.scraper.estimate_url,
        &cert,
        &ScrapeOptions::from_config(config),
    )
    .await;
    teardown(&session).await;

    Ok(Json(result?))
}

async fn price_cards(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut file_bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ScrapeError::InvalidInput(format!("bad multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ScrapeError::InvalidInput(format!("unreadable upload: {e}")))?;
            file_bytes = Some(bytes);
        }
    }

    let bytes =
        file_bytes.ok_or_else(|| ScrapeError::InvalidInput("missing multipart field 'file'".into()))?;
    if bytes.is_empty() {
        return Err(ScrapeError::InvalidInput("uploaded file is empty".into()).into());
    }

    let config = &state.config;
    let session = connect(config).await?;
    let result = batch::price_sheet(&session, &bytes, config).await;
    teardown(&session).await;

    let (out, _stats) = result?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"priced_cards.csv\"",
            ),
        ],
        out,
    )
        .into_response())
}

// ── Session lifecycle ─────────────────────────────────────────────────────────

async fn connect(config: &AppConfig) -> Result<WebDriverSession, ApiError> {
    Ok(WebDriverSession::connect(
        &config.scraper.webdriver_url,
        Duration::from_secs(config.scraper.nav_timeout_secs),
    )
    .await?)
}

/// Close the browser session on every exit path; a leaked session is an
/// external process we never get back.
async fn teardown(session: &dyn PageSession) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "session close failed");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
