//! Fan-out over every source and merge into one feed.
//!
//! [`Aggregator::aggregate`] is the single entry point used by the HTTP
//! boundary and the CLI. A source that errors, panics, or overruns its
//! deadline settles to an empty list, so one broken outlet never fails the
//! request.

use crate::feeds::fetcher::NewsFetcher;
use crate::freshness::filter_fresh;
use crate::models::NewsItem;
use crate::normalize::valid_image_url;
use crate::sanitize::decode_all_entities;
use crate::sources::{ALWAYS_EXCLUDED_SOURCE, FALLBACK_IMAGE_URL, SourceTable};
use futures::FutureExt;
use futures::future::join_all;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Default upper bound on a single source, retries included.
pub const DEFAULT_FETCH_DEADLINE: Duration = Duration::from_secs(45);

/// Runs a set of fetchers concurrently and post-processes their output.
pub struct Aggregator<F> {
    fetchers: Vec<F>,
    sources: SourceTable,
    fetch_deadline: Duration,
}

impl<F> Aggregator<F>
where
    F: NewsFetcher + Sync,
{
    pub fn new(fetchers: Vec<F>, sources: SourceTable, fetch_deadline: Duration) -> Self {
        Self {
            fetchers,
            sources,
            fetch_deadline,
        }
    }

    /// Keep only the fetcher for `label`, or `None` if no fetcher has it.
    ///
    /// Post-processing and the permanent exclusion still apply.
    pub fn single_source(self, label: &str) -> Option<Self> {
        let fetchers: Vec<F> = self
            .fetchers
            .into_iter()
            .filter(|f| f.source() == label)
            .collect();
        if fetchers.is_empty() {
            return None;
        }
        Some(Self {
            fetchers,
            sources: self.sources,
            fetch_deadline: self.fetch_deadline,
        })
    }

    /// Fetch every source and return the merged, cleaned, filtered feed.
    ///
    /// Items come back grouped by source in fetcher order; callers that want
    /// chronological order sort on `publication_date` themselves.
    #[instrument(level = "info", skip(self))]
    pub async fn aggregate(&self, exclude_sources: Vec<String>) -> Vec<NewsItem> {
        let t0 = Instant::now();

        let mut excluded: HashSet<String> = exclude_sources.into_iter().collect();
        excluded.insert(ALWAYS_EXCLUDED_SOURCE.to_string());

        let settled = join_all(self.fetchers.iter().map(|f| self.settle(f))).await;
        let fetched: usize = settled.iter().map(Vec::len).sum();

        let merged: Vec<NewsItem> = settled
            .into_iter()
            .flatten()
            .filter(has_required_text)
            .map(redecode)
            .collect();
        let valid = merged.len();

        let items: Vec<NewsItem> = filter_fresh(merged)
            .into_iter()
            .map(|item| self.backfill_image(item))
            .filter(|item| !excluded.contains(&item.source))
            .collect();

        if items.is_empty() {
            warn!(
                sources = self.fetchers.len(),
                fetched,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Aggregation produced no items"
            );
        } else {
            info!(
                sources = self.fetchers.len(),
                fetched,
                valid,
                returned = items.len(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Aggregation complete"
            );
        }
        items
    }

    /// Run one fetcher to completion, turning every failure mode into an empty list.
    async fn settle(&self, fetcher: &F) -> Vec<NewsItem> {
        let source = fetcher.source();
        let guarded = AssertUnwindSafe(fetcher.fetch_or_empty()).catch_unwind();

        match timeout(self.fetch_deadline, guarded).await {
            Ok(Ok(items)) => {
                debug!(%source, count = items.len(), "Source settled");
                items
            }
            Ok(Err(panic)) => {
                error!(%source, panic = %panic_message(panic.as_ref()), "Source panicked; contributing no items");
                Vec::new()
            }
            Err(_) => {
                error!(%source, deadline = ?self.fetch_deadline, "Source exceeded deadline; contributing no items");
                Vec::new()
            }
        }
    }

    fn backfill_image(&self, mut item: NewsItem) -> NewsItem {
        if let Some(url) = valid_image_url(&item.image_url) {
            item.image_url = url;
            return item;
        }
        item.image_url = self
            .sources
            .default_image(&item.source)
            .and_then(valid_image_url)
            .unwrap_or_else(|| FALLBACK_IMAGE_URL.to_string());
        debug!(source = %item.source, image_url = %item.image_url, "Backfilled image");
        item
    }
}

fn has_required_text(item: &NewsItem) -> bool {
    let ok = !item.title.trim().is_empty() && !item.content.trim().is_empty();
    if !ok {
        debug!(source = %item.source, title = %item.title, "Dropping item without title or content");
    }
    ok
}

fn redecode(mut item: NewsItem) -> NewsItem {
    item.title = decode_all_entities(&item.title);
    item.content = decode_all_entities(&item.content);
    item
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
