//! Lenient publication date parsing.
//!
//! Feeds use RFC 2822 (RSS), RFC 3339 (Atom, Dublin Core) and a handful of
//! home-grown variants. Timestamps without an offset are read as UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a feed date string in any of the supported formats.
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt);
    }
    // Some publishers write "-03:00" style offsets into RFC 2822 dates.
    if let Ok(dt) = DateTime::parse_from_str(s, "%a, %d %b %Y %H:%M:%S %:z") {
        return Some(dt);
    }

    let utc = FixedOffset::east_opt(0)?;
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().with_timezone(&utc));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().with_timezone(&utc));
    }

    None
}

/// Render a timestamp as RFC 3339 with second precision.
pub fn to_iso(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// The current instant as RFC 3339 in UTC.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_rfc2822() {
        let dt = parse_date("Sat, 17 Oct 2026 14:30:00 -0300").unwrap();
        assert_eq!(to_iso(&dt), "2026-10-17T14:30:00-03:00");
    }

    #[test]
    fn test_parse_rfc2822_gmt() {
        let dt = parse_date("Sat, 17 Oct 2026 14:30:00 GMT").unwrap();
        assert_eq!(to_iso(&dt), "2026-10-17T14:30:00+00:00");
    }

    #[test]
    fn test_parse_rfc2822_colon_offset() {
        let dt = parse_date("Sat, 17 Oct 2026 14:30:00 -03:00").unwrap();
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_date("2026-10-17T09:05:00Z").unwrap();
        assert_eq!(to_iso(&dt), "2026-10-17T09:05:00+00:00");
    }

    #[test]
    fn test_parse_naive_is_utc() {
        let dt = parse_date("2026-10-17 09:05:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 0);
        assert_eq!(dt.hour(), 9);
    }

    #[test]
    fn test_parse_date_only() {
        let dt = parse_date("2026-10-17").unwrap();
        assert_eq!(to_iso(&dt), "2026-10-17T00:00:00+00:00");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_date("ontem à tarde").is_none());
        assert!(parse_date("   ").is_none());
    }
}
