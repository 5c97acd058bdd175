//! Error types for feed fetching and parsing.
//!
//! None of these escape the aggregator: a failing source is logged and
//! contributes an empty list to the merged feed.

use thiserror::Error;

/// Errors that can occur while fetching or parsing a single feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The feed endpoint answered with a non-2xx status.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// The feed URL that was requested
        url: String,
    },

    /// The endpoint answered 2xx with an empty or whitespace-only body.
    #[error("empty response body from {0}")]
    EmptyBody(String),

    /// The body could not be read as RSS or Atom.
    #[error("feed parse error: {0}")]
    Parse(String),
}
