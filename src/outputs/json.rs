//! JSON snapshot output for one-shot runs.
//!
//! # Output Structure
//!
//! Files are organized by date with edition names:
//! ```text
//! json_output_dir/
//! └── 2026-10-18/
//!     ├── morning.json
//!     ├── afternoon.json
//!     └── evening.json
//! ```
//!
//! A later run in the same edition overwrites the earlier file.

use crate::models::NewsDigest;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the snapshot file for `digest` below `json_output_dir`.
pub fn digest_path(digest: &NewsDigest, json_output_dir: &str) -> PathBuf {
    PathBuf::from(json_output_dir)
        .join(&digest.local_date)
        .join(format!("{}.json", digest.time_of_day))
}

/// Write a [`NewsDigest`] to `{json_output_dir}/{date}/{time_of_day}.json`.
///
/// # Returns
///
/// The path written, or an error if directory creation or file writing fails.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_digest(
    digest: &NewsDigest,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(digest)?;
    let path = digest_path(digest, json_output_dir);

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), items = digest.items.len(), "Wrote JSON digest");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_item;

    fn digest() -> NewsDigest {
        NewsDigest {
            local_date: "2026-10-18".to_string(),
            time_of_day: "evening".to_string(),
            local_time: "18:00:00".to_string(),
            items: vec![sample_item("Exame", "Dólar fecha em queda")],
        }
    }

    #[test]
    fn test_digest_path() {
        let path = digest_path(&digest(), "/srv/json");
        assert_eq!(path, PathBuf::from("/srv/json/2026-10-18/evening.json"));
    }

    #[tokio::test]
    async fn test_write_digest_round_trips() {
        let dir = std::env::temp_dir().join(format!("market_news_json_{}", std::process::id()));
        let path = write_digest(&digest(), dir.to_str().unwrap()).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let back: NewsDigest = serde_json::from_str(&written).unwrap();
        assert_eq!(back.items.len(), 1);
        assert_eq!(back.items[0].title, "Dólar fecha em queda");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
