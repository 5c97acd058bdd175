//! Data models for normalized news items and feed snapshots.
//!
//! - [`NewsItem`]: one normalized article, the unit returned by the HTTP API
//! - [`NewsDigest`]: a dated collection of items written by the one-shot CLI mode
//! - [`ExcludeRequest`]: optional request body of the aggregation endpoint

use serde::{Deserialize, Serialize};

/// A normalized article.
///
/// Every item leaving the aggregator has a non-empty `title` and `content`
/// and an `image_url` that parses as an absolute `http(s)` URL.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NewsItem {
    /// Headline, entity-decoded and never empty.
    pub title: String,
    /// Native subtitle, or the first sentence of `content`.
    pub subtitle: Option<String>,
    /// Plain-text body or summary.
    pub content: String,
    /// RFC 3339 timestamp when the feed date could be parsed, otherwise the raw value.
    pub publication_date: Option<String>,
    /// Entry author, or the source label.
    pub author: Option<String>,
    /// Editorial category such as "Economia" or "Mercado de Ações".
    pub category: String,
    /// Article image, source default image, or the stock fallback.
    pub image_url: String,
    /// Fixed label of the originating outlet.
    pub source: String,
    /// Link back to the original article; empty when the feed has none.
    #[serde(default)]
    pub source_url: String,
}

/// A snapshot of the aggregated feed for a single run.
///
/// The `time_of_day` field names the edition:
/// - `"morning"`: 00:00 - 08:00
/// - `"afternoon"`: 08:00 - 16:00
/// - `"evening"`: 16:00 - 24:00
#[derive(Debug, Deserialize, Serialize)]
pub struct NewsDigest {
    /// The date of the run in `YYYY-MM-DD` format.
    pub local_date: String,
    /// "morning", "afternoon", or "evening".
    pub time_of_day: String,
    /// The exact local time of the run.
    pub local_time: String,
    /// The aggregated items, in fetch order.
    pub items: Vec<NewsItem>,
}

/// Body accepted by the aggregation endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludeRequest {
    /// Source labels the caller does not want to see.
    #[serde(default)]
    pub exclude_sources: Vec<String>,
}

#[cfg(test)]
pub(crate) fn sample_item(source: &str, title: &str) -> NewsItem {
    NewsItem {
        title: title.to_string(),
        subtitle: None,
        content: format!("{} conteúdo", title),
        publication_date: Some(crate::dates::now_iso()),
        author: Some(source.to_string()),
        category: "Economia".to_string(),
        image_url: "https://example.com/img.jpg".to_string(),
        source: source.to_string(),
        source_url: "https://example.com/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_item_serializes_snake_case() {
        let item = sample_item("Exame", "Dólar cai");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["source"], "Exame");
        assert_eq!(json["image_url"], "https://example.com/img.jpg");
        assert!(json.get("publication_date").is_some());
        assert!(json.get("source_url").is_some());
        assert!(json["subtitle"].is_null());
    }

    #[test]
    fn test_digest_serialization() {
        let digest = NewsDigest {
            local_date: "2026-10-18".to_string(),
            time_of_day: "morning".to_string(),
            local_time: "07:00:00".to_string(),
            items: vec![sample_item("Exame", "Dólar cai")],
        };
        let json = serde_json::to_string(&digest).unwrap();
        assert!(json.contains("2026-10-18"));
        assert!(json.contains("Dólar cai"));
    }

    #[test]
    fn test_exclude_request_camel_case() {
        let req: ExcludeRequest =
            serde_json::from_str(r#"{"excludeSources": ["Exame", "G1 Economia"]}"#).unwrap();
        assert_eq!(req.exclude_sources, vec!["Exame", "G1 Economia"]);
    }

    #[test]
    fn test_exclude_request_defaults_to_empty() {
        let req: ExcludeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.exclude_sources.is_empty());
    }
}
