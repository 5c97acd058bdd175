//! Feed retrieval: download, parse, and normalize one outlet at a time.
//!
//! Every outlet goes through the same three stages:
//!
//! 1. **Download**: [`http::RetryFetch`] wraps a `reqwest` GET with linear backoff
//! 2. **Parse**: [`parser::parse_feed`] reads RSS or Atom into raw entries
//! 3. **Normalize**: each raw entry becomes a [`crate::models::NewsItem`]
//!
//! [`fetcher::FeedFetcher`] ties the stages together for one
//! [`crate::sources::SourceConfig`] row and applies the freshness filter.

pub mod fetcher;
pub mod http;
pub mod parser;
