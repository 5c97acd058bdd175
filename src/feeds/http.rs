//! Feed downloads with linear backoff retry logic.
//!
//! # Architecture
//!
//! - [`FetchBody`]: Core trait defining an async "GET this URL as text"
//! - [`HttpFetch`]: `reqwest` implementation with a user agent and request timeout
//! - [`RetryFetch`]: Decorator that adds retry logic to any `FetchBody` implementation
//!
//! # Retry Strategy
//!
//! - At most 3 attempts
//! - An empty body counts as a failed attempt
//! - The delay before attempt `n + 1` is `n × base_delay` (1s, 2s)

use crate::error::FetchError;
use reqwest::Client;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// User agent sent with every feed request.
pub const USER_AGENT: &str = concat!(
    "market_news/",
    env!("CARGO_PKG_VERSION"),
    " (+news aggregation bot; RSS/Atom reader)"
);

/// Default number of attempts per feed.
pub const MAX_ATTEMPTS: usize = 3;

/// Trait for downloading a document as text.
pub trait FetchBody {
    /// Fetch `url` and return the response body.
    fn get_body(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Plain HTTP GET through a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    client: Client,
}

impl HttpFetch {
    /// Build a client with the crate user agent and a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl FetchBody for HttpFetch {
    #[instrument(level = "debug", skip(self))]
    async fn get_body(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5",
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Downloaded feed"
        );
        Ok(body)
    }
}

/// Wrapper that adds linear backoff retry logic to any [`FetchBody`] implementation.
///
/// The delay between attempts follows:
/// ```text
/// delay = attempt * base_delay
/// ```
pub struct RetryFetch<T> {
    /// The underlying fetcher to wrap.
    inner: T,
    /// Total number of attempts, including the first one.
    max_attempts: usize,
    /// Unit of the backoff; attempt `n` waits `n` units.
    base_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: FetchBody,
{
    /// Create a new retry wrapper around an existing [`FetchBody`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let http = HttpFetch::new(Duration::from_secs(15))?;
    /// let retrying = RetryFetch::new(http, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<T> FetchBody for RetryFetch<T>
where
    T: FetchBody + Sync,
{
    #[instrument(level = "info", skip(self))]
    async fn get_body(&self, url: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let result = match self.inner.get_body(url).await {
                Ok(body) if body.trim().is_empty() => Err(FetchError::EmptyBody(url.to_string())),
                other => other,
            };

            match result {
                Ok(body) => return Ok(body),
                Err(e) => {
                    let total_dt = total_t0.elapsed();
                    if attempt >= self.max_attempts {
                        error!(
                            attempt,
                            max = self.max_attempts,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "Feed fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.base_delay.saturating_mul(attempt as u32);
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "Feed fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
