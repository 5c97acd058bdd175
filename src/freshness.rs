//! Two-day freshness window.
//!
//! An item is kept when it was published at or after local midnight of
//! yesterday. Items without a date, or with a date that cannot be parsed, are
//! kept as well: dropping a real article is worse than showing an old one.

use crate::dates::parse_date;
use crate::models::NewsItem;
use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use tracing::{debug, warn};

/// Keep the items inside the window ending now.
pub fn filter_fresh(items: Vec<NewsItem>) -> Vec<NewsItem> {
    filter_fresh_at(items, Local::now())
}

/// Keep the items published at or after midnight of the day before `now`.
pub fn filter_fresh_at<Tz: TimeZone>(items: Vec<NewsItem>, now: DateTime<Tz>) -> Vec<NewsItem> {
    let cutoff = window_start(&now).with_timezone(&Utc);
    let before = items.len();

    let kept: Vec<NewsItem> = items
        .into_iter()
        .filter(|item| {
            let Some(raw) = item.publication_date.as_deref() else {
                return true;
            };
            match parse_date(raw) {
                Some(published) => published.with_timezone(&Utc) >= cutoff,
                None => {
                    warn!(source = %item.source, date = %raw, "Unparseable publication date; keeping item");
                    true
                }
            }
        })
        .collect();

    debug!(before, kept = kept.len(), "Applied freshness window");
    kept
}

/// Midnight of the day before `now`, in `now`'s timezone.
fn window_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let yesterday = midnight - Duration::days(1);
    now.timezone()
        .from_local_datetime(&yesterday)
        .earliest()
        .unwrap_or_else(|| now.clone() - Duration::days(1))
}
