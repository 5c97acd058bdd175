//! HTML and entity cleanup for feed text.
//!
//! Feed publishers are inconsistent: some wrap markup in CDATA, some escape it,
//! some do both, and Portuguese-language outlets frequently ship accented
//! letters as numeric references. [`clean`] turns any of those into plain,
//! single-spaced text.
//!
//! The steps run in a fixed order:
//!
//! 1. Unwrap a CDATA section that encloses the whole string
//! 2. Decode the known entity table (repeated until nothing changes)
//! 3. Remove leftover `<![CDATA[` and `]]>` markers
//! 4. Drop `<script>` and `<style>` blocks along with their content
//! 5. Replace every remaining tag with a single space
//! 6. Collapse whitespace and trim
//!
//! Decoding happens before tag stripping so escaped markup such as
//! `&lt;p&gt;` is removed like literal markup.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Named and numeric references decoded by [`decode_entities`].
const ENTITY_TABLE: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#34;", "\""),
    ("&#39;", "'"),
    ("&#039;", "'"),
    ("&apos;", "'"),
    ("&nbsp;", " "),
    ("&#160;", " "),
    ("&aacute;", "á"),
    ("&#225;", "á"),
    ("&eacute;", "é"),
    ("&#233;", "é"),
    ("&iacute;", "í"),
    ("&#237;", "í"),
    ("&oacute;", "ó"),
    ("&#243;", "ó"),
    ("&uacute;", "ú"),
    ("&#250;", "ú"),
    ("&acirc;", "â"),
    ("&#226;", "â"),
    ("&ecirc;", "ê"),
    ("&#234;", "ê"),
    ("&ocirc;", "ô"),
    ("&#244;", "ô"),
    ("&agrave;", "à"),
    ("&#224;", "à"),
    ("&ccedil;", "ç"),
    ("&#231;", "ç"),
    ("&atilde;", "ã"),
    ("&#227;", "ã"),
    ("&otilde;", "õ"),
    ("&#245;", "õ"),
    ("&Aacute;", "Á"),
    ("&#193;", "Á"),
    ("&Eacute;", "É"),
    ("&#201;", "É"),
    ("&Iacute;", "Í"),
    ("&#205;", "Í"),
    ("&Oacute;", "Ó"),
    ("&#211;", "Ó"),
    ("&Uacute;", "Ú"),
    ("&#218;", "Ú"),
    ("&Acirc;", "Â"),
    ("&#194;", "Â"),
    ("&Ecirc;", "Ê"),
    ("&#202;", "Ê"),
    ("&Ocirc;", "Ô"),
    ("&#212;", "Ô"),
    ("&Agrave;", "À"),
    ("&#192;", "À"),
    ("&Ccedil;", "Ç"),
    ("&#199;", "Ç"),
    ("&Atilde;", "Ã"),
    ("&#195;", "Ã"),
    ("&Otilde;", "Õ"),
    ("&#213;", "Õ"),
];

static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(?:[a-zA-Z]+|#[0-9]{1,7});").expect("entity regex"));
static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:([0-9]{1,7})|[xX]([0-9a-fA-F]{1,6}));").expect("numeric regex"));
static CDATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*<!\[CDATA\[(.*)\]\]>\s*$").expect("cdata regex"));
static CDATA_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!\[CDATA\[|\]\]>").expect("cdata marker regex"));
static SCRIPT_STYLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("script/style regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

/// Turn raw feed text (possibly CDATA-wrapped, escaped, or marked up) into
/// plain single-spaced text.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean("<![CDATA[<p>Olá &amp; adeus</p>]]>"), "Olá & adeus");
/// ```
pub fn clean(raw: &str) -> String {
    let unwrapped = unwrap_cdata(raw);
    let decoded = decode_entities(unwrapped);
    let without_markers = CDATA_MARKER_RE.replace_all(&decoded, " ");
    let without_blocks = SCRIPT_STYLE_RE.replace_all(&without_markers, " ");
    let without_tags = TAG_RE.replace_all(&without_blocks, " ");
    collapse_whitespace(&without_tags)
}

/// Return the inner text when the whole string is one CDATA section.
///
/// Adjacent or nested sections are not a single wrapper and come back as-is.
pub fn unwrap_cdata(raw: &str) -> &str {
    CDATA_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|inner| !inner.contains("]]>"))
        .unwrap_or(raw)
}

/// Decode the entities in the fixed table.
///
/// Decoding repeats until the string stops changing, so `&amp;eacute;`
/// ends up as `é`. Unknown references are left untouched.
pub fn decode_entities(s: &str) -> String {
    let mut current = s.to_string();
    loop {
        let next = ENTITY_RE
            .replace_all(&current, |caps: &Captures| {
                let whole = &caps[0];
                ENTITY_TABLE
                    .iter()
                    .find(|(entity, _)| *entity == whole)
                    .map(|(_, text)| (*text).to_string())
                    .unwrap_or_else(|| whole.to_string())
            })
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Decode the fixed table plus any decimal or hexadecimal character
/// reference, e.g. `&#8220;` or `&#x2014;`.
pub fn decode_all_entities(s: &str) -> String {
    let mut current = decode_entities(s);
    loop {
        let next = NUMERIC_RE
            .replace_all(&current, |caps: &Captures| {
                let code = match (caps.get(1), caps.get(2)) {
                    (Some(dec), _) => dec.as_str().parse::<u32>().ok(),
                    (None, Some(hex)) => u32::from_str_radix(hex.as_str(), 16).ok(),
                    _ => None,
                };
                code.and_then(char::from_u32)
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
        let next = decode_entities(&next);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Collapse every run of whitespace (including non-breaking spaces) to one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
