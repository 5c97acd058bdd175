//! Command-line interface definitions for Market News.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment variables.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Market News aggregator.
///
/// # Examples
///
/// ```sh
/// # Serve the aggregated feed over HTTP
/// market_news serve --bind 0.0.0.0:8000
///
/// # One-shot run, printing the JSON array
/// market_news fetch -x "Folha Mercado"
///
/// # One-shot run written to ./json/<date>/<time_of_day>.json
/// market_news fetch -j ./json
///
/// # Use a custom source table
/// market_news --sources sources.yaml serve
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML source table (defaults to the built-in outlets)
    #[arg(short, long, env = "NEWS_SOURCES_FILE", global = true)]
    pub sources: Option<String>,

    /// Per-request timeout for feed downloads, in seconds
    #[arg(long, env = "NEWS_REQUEST_TIMEOUT_SECS", default_value_t = 15, global = true)]
    pub request_timeout_secs: u64,

    /// Upper bound on one source including retries, in seconds
    #[arg(long, env = "NEWS_FETCH_DEADLINE_SECS", default_value_t = 45, global = true)]
    pub fetch_deadline_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the aggregated feed over HTTP
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "NEWS_BIND", default_value = "0.0.0.0:8000")]
        bind: String,
    },
    /// Run the pipeline once and print or store the result
    Fetch {
        /// Source labels to leave out (repeatable)
        #[arg(short = 'x', long = "exclude")]
        exclude: Vec<String>,

        /// Fetch only the source with this label
        #[arg(long)]
        source: Option<String>,

        /// Output directory for the JSON digest; prints to stdout when absent
        #[arg(short, long)]
        json_output_dir: Option<String>,
    },
}
