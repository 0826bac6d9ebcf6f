mod api;
mod batch;
mod config;
mod error;
mod models;
mod scraper;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::scraper::driver::{PageSession, WebDriverSession};

#[derive(Parser)]
#[command(name = "cardcomps", about = "Graded-card comps pricing service", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (estimate lookup + batch sheet pricing)
    Serve,

    /// Price a local CSV of cards and write the annotated sheet
    PriceCsv {
        /// Input CSV with card identity columns
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the annotated CSV
        #[arg(short, long, default_value = "priced_cards.csv")]
        output: PathBuf,
    },

    /// Price a single card from a free-text description
    Comps {
        /// Card description, e.g. "1986 Fleer Isiah Thomas #109"
        query: String,

        /// Grade cell text, e.g. "PSA 10" or "10"
        #[arg(short, long)]
        grade: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "cardcomps=info,warn",
        1 => "cardcomps=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Serve => {
            api::serve(config).await?;
        }

        Command::PriceCsv { input, output } => {
            let _t = utils::Timer::start("CSV pricing run");

            let bytes = std::fs::read(&input)
                .with_context(|| format!("Failed to read {input:?}"))?;

            let session = WebDriverSession::connect(
                &config.scraper.webdriver_url,
                Duration::from_secs(config.scraper.nav_timeout_secs),
            )
            .await
            .context("Failed to open page-driver session")?;

            let run = batch::price_sheet(&session, &bytes, &config).await;
            if let Err(e) = session.close().await {
                warn!("Session close failed: {e}");
            }

            let (annotated, stats) = run.context("Batch pricing failed")?;
            std::fs::write(&output, annotated)
                .with_context(|| format!("Failed to write {output:?}"))?;

            info!(
                "Done: {} rows, {} priced, {} without comps → {:?}",
                stats.rows_total, stats.rows_priced, stats.rows_without_comps, output
            );
        }

        Command::Comps { query, grade } => {
            let builder = scraper::query::QueryBuilder::new(
                &config.scraper.sales_base_url,
                config.pricing.grade_label,
            );
            let pricing_query = builder
                .build_from_text(&query, grade.as_deref())
                .context("Query text is empty")?;

            let session = WebDriverSession::connect(
                &config.scraper.webdriver_url,
                Duration::from_secs(config.scraper.nav_timeout_secs),
            )
            .await
            .context("Failed to open page-driver session")?;

            let result = scraper::scrape_comps(
                &session,
                &pricing_query,
                &scraper::ScrapeOptions::from_config(&config),
                chrono::Utc::now(),
            )
            .await;
            if let Err(e) = session.close().await {
                warn!("Session close failed: {e}");
            }

            println!("Query   : {}", pricing_query.raw_text);
            println!("URL     : {}", result.url_used);
            match result.average_price {
                Some(avg) => println!("Average : ${avg:.2} ({} comps)", result.comp_count),
                None => println!("Average : — ({})", result.notes),
            }
            println!("Parsed  : {} priced rows total", result.total_parsed);
        }
    }

    Ok(())
}
