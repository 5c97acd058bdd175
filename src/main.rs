//! # Market News
//!
//! Aggregates Brazilian financial news from a fixed table of RSS/Atom feeds
//! into one normalized, freshness-filtered list.
//!
//! ## Features
//!
//! - Fetches every configured outlet concurrently, with retries and a
//!   per-source deadline
//! - Parses RSS 2.0 and Atom, including `media:*` extensions
//! - Cleans HTML, CDATA and entities out of titles and bodies
//! - Resolves a usable image for every item
//! - Keeps only items published since the start of yesterday (local time)
//! - Serves the result over HTTP with permissive CORS, or prints it once
//!
//! ## Usage
//!
//! ```sh
//! market_news serve --bind 0.0.0.0:8000
//! market_news fetch -x "Folha Mercado" -j ./json
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: one [`feeds::fetcher::FeedFetcher`] per source downloads its feed
//! 2. **Normalizing**: raw entries become [`models::NewsItem`]s
//! 3. **Aggregating**: [`aggregator::Aggregator`] merges, cleans and filters
//! 4. **Output**: HTTP response, stdout, or a dated JSON file

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod cli;
mod dates;
mod error;
mod feeds;
mod freshness;
mod models;
mod normalize;
mod outputs;
mod sanitize;
mod server;
mod sources;
mod utils;

use aggregator::Aggregator;
use cli::{Cli, Command};
use feeds::fetcher::FeedFetcher;
use models::NewsDigest;
use outputs::json;
use server::AppState;
use sources::SourceTable;
use utils::{ensure_writable_dir, time_of_day};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("market_news starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let table = SourceTable::load(args.sources.as_deref()).await?;
    let request_timeout = Duration::from_secs(args.request_timeout_secs);
    let fetch_deadline = Duration::from_secs(args.fetch_deadline_secs);
    let fetchers = FeedFetcher::for_table(&table, request_timeout)?;

    match args.command {
        Command::Serve { bind } => {
            let aggregator = Aggregator::new(fetchers, table, fetch_deadline);
            let state = AppState {
                aggregator: Arc::new(aggregator),
            };
            server::serve(&bind, state).await?;
        }
        Command::Fetch {
            exclude,
            source,
            json_output_dir,
        } => {
            // Early check: ensure JSON output dir is writable
            if let Some(dir) = json_output_dir.as_deref() {
                if let Err(e) = ensure_writable_dir(dir).await {
                    error!(
                        path = %dir,
                        error = %e,
                        "JSON output directory is not writable (fix perms or choose a different path)"
                    );
                    return Err(e);
                }
            }

            let aggregator = Aggregator::new(fetchers, table, fetch_deadline);
            let aggregator = match source {
                Some(label) => {
                    info!(source = %label, "Fetching single source");
                    aggregator
                        .single_source(&label)
                        .ok_or_else(|| format!("unknown source: {}", label))?
                }
                None => aggregator,
            };
            let items = aggregator.aggregate(exclude).await;

            match json_output_dir {
                Some(dir) => {
                    let now = Local::now();
                    let digest = NewsDigest {
                        local_date: now.date_naive().to_string(),
                        time_of_day: time_of_day(),
                        local_time: now.time().to_string(),
                        items,
                    };
                    json::write_digest(&digest, &dir).await?;
                }
                None => println!("{}", serde_json::to_string_pretty(&items)?),
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
    Ok(())
}
