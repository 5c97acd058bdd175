//! Conversion of a raw feed entry into a [`NewsItem`].
//!
//! Normalization never fails. Every missing or broken field degrades to a
//! default so one sloppy entry cannot take down its whole feed.
//!
//! # Image resolution
//!
//! The first candidate that parses as an absolute `http(s)` URL wins:
//!
//! | # | Candidate |
//! |---|-----------|
//! | a | `media:content@url` (also inside `media:group`) |
//! | b | first `<img src>` in the raw, entity-decoded content |
//! | c | `media:thumbnail@url` or a `thumbnail` element |
//! | d | `enclosure@url` typed `image/*` or ending in an image extension |
//! | e | the source's default image |
//! | f | [`FALLBACK_IMAGE_URL`] |

use crate::dates::{now_iso, parse_date, to_iso};
use crate::feeds::parser::RawEntry;
use crate::models::NewsItem;
use crate::sanitize::{clean, collapse_whitespace, decode_entities};
use crate::sources::{FALLBACK_IMAGE_URL, SourceConfig};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

/// Title used when an entry has none.
pub const UNTITLED: &str = "Sem título";

const TITLE_FIELDS: &[&str] = &["title", "media:title", "dc:title"];
const CONTENT_FIELDS: &[&str] = &[
    "content:encoded",
    "content",
    "summary",
    "description",
    "media:description",
    "media:group/media:description",
];
const SUBTITLE_FIELDS: &[&str] = &["subtitle", "itunes:subtitle"];
const DATE_FIELDS: &[&str] = &["pubdate", "published", "dc:date", "updated", "date"];
const AUTHOR_FIELDS: &[&str] = &["author/name", "dc:creator", "author", "creator"];
const MEDIA_CONTENT_FIELDS: &[&str] = &["media:content", "media:group/media:content"];
const THUMBNAIL_FIELDS: &[&str] = &[
    "media:thumbnail",
    "media:group/media:thumbnail",
    "media:content/media:thumbnail",
    "thumbnail",
];
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif"];

static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());

/// Build a [`NewsItem`] from `entry`, labelled with `source`.
pub fn normalize(entry: &RawEntry, source: &SourceConfig) -> NewsItem {
    let title = entry
        .first_text(TITLE_FIELDS)
        .map(clean)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let raw_content = first_content(entry);
    let content = raw_content.map(clean).unwrap_or_default();

    let subtitle = entry
        .first_text(SUBTITLE_FIELDS)
        .map(clean)
        .filter(|s| !s.is_empty())
        .or_else(|| first_sentence(&content));

    let publication_date = Some(
        entry
            .first_text(DATE_FIELDS)
            .map(|raw| match parse_date(raw) {
                Some(dt) => to_iso(&dt),
                None => collapse_whitespace(raw),
            })
            .unwrap_or_else(now_iso),
    );

    let author = entry
        .first_text(AUTHOR_FIELDS)
        .map(clean)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| source.name.clone());

    let source_url = source_url(entry).unwrap_or_default();
    let image_url = resolve_image(entry, raw_content, source);
    let category = source.categorize(&title, &content);

    NewsItem {
        title,
        subtitle,
        content,
        publication_date,
        author: Some(author),
        category,
        image_url,
        source: source.name.clone(),
        source_url,
    }
}

fn first_content(entry: &RawEntry) -> Option<&str> {
    CONTENT_FIELDS.iter().find_map(|path| {
        entry
            .all(path)
            .iter()
            .map(|f| f.text.as_str())
            .find(|t| !clean(t).is_empty())
    })
}

/// First `.`-delimited sentence of already sanitized text.
pub fn first_sentence(content: &str) -> Option<String> {
    content
        .split('.')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn source_url(entry: &RawEntry) -> Option<String> {
    let alternate = entry
        .all("link")
        .iter()
        .find(|l| matches!(l.attr("rel"), None | Some("alternate")) && l.attr("href").is_some())
        .and_then(|l| l.attr("href"));

    entry
        .first_text(&["feedburner:origlink", "link"])
        .or(alternate)
        .or_else(|| entry.first_attr(&["link"], "href"))
        .or_else(|| entry.first_text(&["url"]))
        .map(|u| decode_entities(u).trim().to_string())
        .filter(|u| !u.is_empty())
}

/// Return `candidate` as a normalized absolute `http(s)` URL, or `None`.
///
/// Protocol-relative URLs (`//cdn.example.com/x.jpg`) are upgraded to `https:`.
pub fn valid_image_url(candidate: &str) -> Option<String> {
    let decoded = decode_entities(candidate.trim());
    let repaired = if decoded.starts_with("//") {
        format!("https:{}", decoded)
    } else {
        decoded
    };
    let parsed = Url::parse(&repaired).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed.to_string()),
        _ => None,
    }
}

/// First `<img src>` in an HTML fragment.
pub fn extract_img_src(html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&IMG_SELECTOR)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| !is_tracking_pixel(src))
        .map(str::to_string)
}

fn is_tracking_pixel(src: &str) -> bool {
    src.is_empty() || src.contains("1x1") || src.contains("pixel") || src.contains("spacer")
}

fn looks_like_image(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn media_content_image(entry: &RawEntry) -> Option<String> {
    MEDIA_CONTENT_FIELDS
        .iter()
        .flat_map(|path| entry.all(path))
        .filter(|f| {
            let medium = f.attr("medium");
            let mime = f.attr("type");
            match (medium, mime) {
                (Some(m), _) => m.eq_ignore_ascii_case("image"),
                (None, Some(t)) => t.starts_with("image/"),
                (None, None) => true,
            }
        })
        .filter_map(|f| f.attr("url"))
        .find_map(valid_image_url)
}

/// First usable `<img>` in the chosen body, then in every other content field.
fn embedded_image(entry: &RawEntry, raw_content: Option<&str>) -> Option<String> {
    let others = CONTENT_FIELDS
        .iter()
        .flat_map(|path| entry.all(path))
        .map(|f| f.text.as_str());
    raw_content.into_iter().chain(others).find_map(|raw| {
        let html = decode_entities(raw);
        extract_img_src(&html).and_then(|src| valid_image_url(&src))
    })
}

fn thumbnail_image(entry: &RawEntry) -> Option<String> {
    THUMBNAIL_FIELDS
        .iter()
        .flat_map(|path| entry.all(path))
        .filter_map(|f| f.attr("url").or(Some(f.text.as_str())))
        .find_map(valid_image_url)
}

fn enclosure_image(entry: &RawEntry) -> Option<String> {
    entry
        .all("enclosure")
        .iter()
        .filter_map(|f| {
            let url = f.attr("url")?;
            let typed_image = f.attr("type").is_some_and(|t| t.starts_with("image/"));
            (typed_image || looks_like_image(url)).then_some(url)
        })
        .find_map(valid_image_url)
}

fn resolve_image(entry: &RawEntry, raw_content: Option<&str>, source: &SourceConfig) -> String {
    media_content_image(entry)
        .or_else(|| embedded_image(entry, raw_content))
        .or_else(|| thumbnail_image(entry))
        .or_else(|| enclosure_image(entry))
        .or_else(|| source.default_image.as_deref().and_then(valid_image_url))
        .unwrap_or_else(|| FALLBACK_IMAGE_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::parser::{RawField, parse_feed};
    use std::collections::HashMap;

    fn source() -> SourceConfig {
        SourceConfig::new(
            "Exame",
            "https://exame.com/feed/",
            "Economia",
            "https://example.com/exame-default.jpg",
        )
    }

    fn field(text: &str) -> RawField {
        RawField {
            text: text.to_string(),
            attrs: HashMap::new(),
        }
    }

    fn attr_field(attrs: &[(&str, &str)]) -> RawField {
        RawField {
            text: String::new(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_normalize_full_rss_item() {
        let xml = r#"<rss><channel><item>
            <title>Taxas sob&amp;#233;m</title>
            <link>https://exame.com/economia/taxas</link>
            <pubDate>Sat, 17 Oct 2026 14:30:00 -0300</pubDate>
            <dc:creator>Ana Souza</dc:creator>
            <description><![CDATA[<p>Juros futuros sobem. Mercado reage.</p>]]></description>
            <media:content url="https://cdn.exame.com/taxas.jpg" medium="image"/>
        </item></channel></rss>"#;
        let entries = parse_feed(xml).unwrap();
        let item = normalize(&entries[0], &source());

        assert_eq!(item.title, "Taxas sobém");
        assert_eq!(item.content, "Juros futuros sobem. Mercado reage.");
        assert_eq!(item.subtitle.as_deref(), Some("Juros futuros sobem"));
        assert_eq!(item.publication_date.as_deref(), Some("2026-10-17T14:30:00-03:00"));
        assert_eq!(item.author.as_deref(), Some("Ana Souza"));
        assert_eq!(item.image_url, "https://cdn.exame.com/taxas.jpg");
        assert_eq!(item.source, "Exame");
        assert_eq!(item.source_url, "https://exame.com/economia/taxas");
        assert_eq!(item.category, "Economia");
    }

    #[test]
    fn test_normalize_empty_entry_defaults() {
        let item = normalize(&RawEntry::default(), &source());
        assert_eq!(item.title, UNTITLED);
        assert_eq!(item.content, "");
        assert_eq!(item.subtitle, None);
        assert_eq!(item.author.as_deref(), Some("Exame"));
        assert_eq!(item.source_url, "");
        assert_eq!(item.image_url, "https://example.com/exame-default.jpg");
        let date = item.publication_date.unwrap();
        assert!(parse_date(&date).is_some(), "default date should be ISO: {date}");
    }

    #[test]
    fn test_normalize_keeps_unparseable_date() {
        let mut entry = RawEntry::default();
        entry.push("pubdate", field("ontem à tarde"));
        let item = normalize(&entry, &source());
        assert_eq!(item.publication_date.as_deref(), Some("ontem à tarde"));
    }

    #[test]
    fn test_native_subtitle_wins() {
        let mut entry = RawEntry::default();
        entry.push("description", field("Primeira frase. Segunda."));
        entry.push("subtitle", field("Linha fina &amp; mais"));
        let item = normalize(&entry, &source());
        assert_eq!(item.subtitle.as_deref(), Some("Linha fina & mais"));
    }

    #[test]
    fn test_content_prefers_encoded_over_description() {
        let mut entry = RawEntry::default();
        entry.push("description", field("Resumo curto"));
        entry.push("content:encoded", field("<p>Texto completo</p>"));
        let item = normalize(&entry, &source());
        assert_eq!(item.content, "Texto completo");
    }

    #[test]
    fn test_content_skips_markup_only_fields() {
        let mut entry = RawEntry::default();
        entry.push("content:encoded", field("<img src=\"https://cdn.example.com/x.jpg\"/>"));
        entry.push("description", field("Texto"));
        let item = normalize(&entry, &source());
        assert_eq!(item.content, "Texto");
    }

    #[test]
    fn test_image_from_markup_only_content_field() {
        let mut entry = RawEntry::default();
        entry.push(
            "content:encoded",
            field("<figure><img src=\"https://cdn.example.com/capa.jpg\"/></figure>"),
        );
        entry.push("description", field("Bolsa sobe"));
        let item = normalize(&entry, &source());
        assert_eq!(item.content, "Bolsa sobe");
        assert_eq!(item.image_url, "https://cdn.example.com/capa.jpg");
    }

    #[test]
    fn test_image_from_escaped_img_tag() {
        let mut entry = RawEntry::default();
        entry.push(
            "description",
            field("&lt;img src=&quot;https://cdn.example.com/inline.png&quot;&gt; Texto"),
        );
        let item = normalize(&entry, &source());
        assert_eq!(item.image_url, "https://cdn.example.com/inline.png");
    }

    #[test]
    fn test_image_invalid_candidate_falls_through() {
        let mut entry = RawEntry::default();
        entry.push("media:content", attr_field(&[("url", "not a url"), ("medium", "image")]));
        entry.push("description", field("<img src=\"javascript:alert(1)\"> Texto"));
        entry.push("media:thumbnail", attr_field(&[("url", "//cdn.example.com/thumb.jpg")]));
        let item = normalize(&entry, &source());
        assert_eq!(item.image_url, "https://cdn.example.com/thumb.jpg");
    }

    #[test]
    fn test_image_from_enclosure() {
        let mut entry = RawEntry::default();
        entry.push(
            "enclosure",
            attr_field(&[("url", "https://cdn.example.com/audio.mp3"), ("type", "audio/mpeg")]),
        );
        entry.push("enclosure", attr_field(&[("url", "https://cdn.example.com/foto.JPG?v=2")]));
        let item = normalize(&entry, &source());
        assert_eq!(item.image_url, "https://cdn.example.com/foto.JPG?v=2");
    }

    #[test]
    fn test_image_skips_non_image_media() {
        let mut entry = RawEntry::default();
        entry.push(
            "media:content",
            attr_field(&[("url", "https://cdn.example.com/v.mp4"), ("medium", "video")]),
        );
        let item = normalize(&entry, &source());
        assert_eq!(item.image_url, "https://example.com/exame-default.jpg");
    }

    #[test]
    fn test_image_generic_fallback_without_source_default() {
        let mut bare = source();
        bare.default_image = None;
        let item = normalize(&RawEntry::default(), &bare);
        assert_eq!(item.image_url, FALLBACK_IMAGE_URL);
    }

    #[test]
    fn test_missing_image_always_yields_valid_url() {
        let mut broken_default = source();
        broken_default.default_image = Some("::::".to_string());
        let entries = [RawEntry::default(), {
            let mut e = RawEntry::default();
            e.push("description", field("<img src=\"\"> sem imagem"));
            e
        }];
        for entry in &entries {
            for src in [source(), broken_default.clone()] {
                let item = normalize(entry, &src);
                assert!(Url::parse(&item.image_url).is_ok(), "{}", item.image_url);
            }
        }
    }

    #[test]
    fn test_atom_link_and_author() {
        let mut entry = RawEntry::default();
        entry.push("link", attr_field(&[("rel", "enclosure"), ("href", "https://example.org/x.jpg")]));
        entry.push("link", attr_field(&[("rel", "alternate"), ("href", "https://example.org/post")]));
        entry.push("author/name", field("João"));
        entry.push("author", field("João joao@example.org"));
        let item = normalize(&entry, &source());
        assert_eq!(item.source_url, "https://example.org/post");
        assert_eq!(item.author.as_deref(), Some("João"));
    }

    #[test]
    fn test_category_rule_applies() {
        let mut src = source();
        src.category_rules.push(crate::sources::CategoryRule {
            category: "Mercado de Ações".to_string(),
            keywords: vec!["ibovespa".to_string()],
        });
        let mut entry = RawEntry::default();
        entry.push("title", field("Ibovespa renova máxima"));
        assert_eq!(normalize(&entry, &src).category, "Mercado de Ações");
    }

    #[test]
    fn test_extract_img_src_skips_pixels() {
        let html = r#"<img src="https://t.example.com/pixel.gif"><img src="https://cdn.example.com/real.jpg">"#;
        assert_eq!(extract_img_src(html).as_deref(), Some("https://cdn.example.com/real.jpg"));
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("Um. Dois.").as_deref(), Some("Um"));
        assert_eq!(first_sentence("Sem ponto").as_deref(), Some("Sem ponto"));
        assert_eq!(first_sentence(""), None);
        assert_eq!(first_sentence(". depois"), None);
    }
}
