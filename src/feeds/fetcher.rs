//! The per-source fetcher.
//!
//! One [`FeedFetcher`] exists per row of the source table. They differ only in
//! the [`SourceConfig`] they carry.

use crate::error::FetchError;
use crate::feeds::http::{FetchBody, HttpFetch, MAX_ATTEMPTS, RetryFetch};
use crate::feeds::parser::parse_feed;
use crate::freshness::filter_fresh;
use crate::models::NewsItem;
use crate::normalize::normalize;
use crate::sources::{SourceConfig, SourceTable};
use crate::utils::truncate_for_log;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Something that produces the items of one news source.
pub trait NewsFetcher {
    /// Label of the source this fetcher produces items for.
    fn source(&self) -> &str;

    /// Fetch, parse, normalize and freshness-filter the source's items.
    fn fetch(&self) -> impl Future<Output = Result<Vec<NewsItem>, FetchError>> + Send;

    /// Like [`fetch`](Self::fetch), but a failure is logged and becomes an
    /// empty list.
    fn fetch_or_empty(&self) -> impl Future<Output = Vec<NewsItem>> + Send
    where
        Self: Sync,
    {
        async move {
            match self.fetch().await {
                Ok(items) => items,
                Err(e) => {
                    error!(source = %self.source(), error = %e, "Source failed; contributing no items");
                    Vec::new()
                }
            }
        }
    }
}

/// RSS/Atom fetcher for a single configured outlet.
#[derive(Debug)]
pub struct FeedFetcher<T = RetryFetch<HttpFetch>> {
    source: SourceConfig,
    http: T,
}

impl FeedFetcher {
    /// Build one retrying fetcher per source in `table`, sharing a connection pool.
    pub fn for_table(table: &SourceTable, request_timeout: Duration) -> Result<Vec<Self>, FetchError> {
        let http = HttpFetch::new(request_timeout)?;
        Ok(table
            .iter()
            .map(|source| {
                let retrying = RetryFetch::new(http.clone(), MAX_ATTEMPTS, Duration::from_secs(1));
                FeedFetcher::new(source.clone(), retrying)
            })
            .collect())
    }
}

impl<T> FeedFetcher<T>
where
    T: FetchBody + Sync,
{
    pub fn new(source: SourceConfig, http: T) -> Self {
        Self { source, http }
    }
}

impl<T> NewsFetcher for FeedFetcher<T>
where
    T: FetchBody + Sync,
{
    fn source(&self) -> &str {
        &self.source.name
    }

    #[instrument(level = "info", skip_all, fields(source = %self.source.name))]
    async fn fetch(&self) -> Result<Vec<NewsItem>, FetchError> {
        let body = self.http.get_body(&self.source.url).await?;
        let entries = parse_feed(&body).inspect_err(|e| {
            warn!(
                error = %e,
                preview = %truncate_for_log(body.trim_start(), 200),
                "Feed body is not readable RSS or Atom"
            )
        })?;
        let parsed = entries.len();

        let items: Vec<NewsItem> = entries
            .iter()
            .map(|entry| normalize(entry, &self.source))
            .collect();
        let fresh = filter_fresh(items);

        info!(parsed, fresh = fresh.len(), "Fetched source");
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};

    /// Answers every request with the same body or status.
    struct Fixed(Result<String, u16>);

    impl FetchBody for Fixed {
        async fn get_body(&self, url: &str) -> Result<String, FetchError> {
            match &self.0 {
                Ok(body) => Ok(body.clone()),
                Err(status) => Err(FetchError::Status {
                    status: *status,
                    url: url.to_string(),
                }),
            }
        }
    }

    fn source() -> SourceConfig {
        SourceConfig::new(
            "Money Times",
            "https://www.moneytimes.com.br/feed/",
            "Mercado de Ações",
            "https://example.com/mt.jpg",
        )
    }

    fn feed_with_dates() -> String {
        let fresh = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let stale = (Utc::now() - ChronoDuration::days(3)).to_rfc3339_opts(SecondsFormat::Secs, true);
        format!(
            r#"<rss><channel>
            <item><title>Nova</title><description>Hoje.</description><pubDate>{fresh}</pubDate></item>
            <item><title>Velha</title><description>Antes.</description><pubDate>{stale}</pubDate></item>
            <item><title>Sem data</title><description>Talvez.</description></item>
            </channel></rss>"#
        )
    }

    #[tokio::test]
    async fn test_fetch_normalizes_and_filters() {
        let fetcher = FeedFetcher::new(source(), Fixed(Ok(feed_with_dates())));
        let items = fetcher.fetch().await.unwrap();

        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Nova", "Sem data"]);
        assert!(items.iter().all(|i| i.source == "Money Times"));
        assert!(items.iter().all(|i| i.category == "Mercado de Ações"));
    }

    #[tokio::test]
    async fn test_fetch_propagates_errors() {
        let fetcher = FeedFetcher::new(source(), Fixed(Err(503)));
        assert!(matches!(fetcher.fetch().await, Err(FetchError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_fetch_or_empty_swallows_errors() {
        let failing = FeedFetcher::new(source(), Fixed(Err(500)));
        assert!(failing.fetch_or_empty().await.is_empty());

        // Truncated documents either keep the partial entry or yield nothing.
        let truncated = FeedFetcher::new(
            source(),
            Fixed(Ok("<rss><channel><item><title>x</title></chan".to_string())),
        );
        assert!(truncated.fetch_or_empty().await.len() <= 1);
    }

    #[test]
    fn test_for_table_builds_one_fetcher_per_source() {
        let table = SourceTable::builtin();
        let fetchers = FeedFetcher::for_table(&table, Duration::from_secs(5)).unwrap();
        assert_eq!(fetchers.len(), table.len());
        assert_eq!(fetchers[0].source(), table.iter().next().unwrap().name);
    }
}
