//! RSS 2.0, RSS 1.0 (RDF) and Atom parsing into loosely-typed raw entries.
//!
//! Outlets disagree on almost every field name, so the parser does not try to
//! map a schema. It records each element below an `<item>` or `<entry>` under
//! its lower-cased qualified path (`title`, `media:group/media:content`,
//! `author/name`) together with its attributes and text. Text keeps CDATA
//! content and entity references verbatim; decoding is the normalizer's job.

use crate::error::FetchError;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use tracing::warn;

/// One occurrence of an element inside an entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawField {
    /// Concatenated text of the element and its descendants, trimmed.
    pub text: String,
    /// Attributes with lower-cased names and unescaped values.
    pub attrs: HashMap<String, String>,
}

impl RawField {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// One `<item>` or `<entry>` as found in the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    fields: HashMap<String, Vec<RawField>>,
}

impl RawEntry {
    pub fn push(&mut self, path: &str, field: RawField) {
        self.fields.entry(path.to_lowercase()).or_default().push(field);
    }

    /// Every occurrence recorded under `path`.
    pub fn all(&self, path: &str) -> &[RawField] {
        self.fields.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First non-empty text under any of `paths`, in priority order.
    pub fn first_text(&self, paths: &[&str]) -> Option<&str> {
        paths.iter().find_map(|path| {
            self.all(path)
                .iter()
                .map(|f| f.text.as_str())
                .find(|t| !t.is_empty())
        })
    }

    /// First non-empty `attr` value under any of `paths`, in priority order.
    pub fn first_attr(&self, paths: &[&str], attr: &str) -> Option<&str> {
        paths
            .iter()
            .find_map(|path| self.all(path).iter().find_map(|f| f.attr(attr)))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Default)]
struct EntryBuilder {
    entry: RawEntry,
    open: Vec<(String, RawField)>,
}

impl EntryBuilder {
    fn open(&mut self, name: &str, attrs: HashMap<String, String>) {
        for (_, ancestor) in self.open.iter_mut() {
            if !ancestor.text.is_empty() {
                ancestor.text.push(' ');
            }
        }
        let path = match self.open.last() {
            Some((parent, _)) => format!("{}/{}", parent, name),
            None => name.to_string(),
        };
        self.open.push((path, RawField { text: String::new(), attrs }));
    }

    fn close(&mut self) {
        if let Some((path, mut field)) = self.open.pop() {
            field.text = field.text.trim().to_string();
            self.entry.push(&path, field);
        }
    }

    fn append(&mut self, text: &str) {
        for (_, field) in self.open.iter_mut() {
            field.text.push_str(text);
        }
    }

    fn depth(&self) -> usize {
        self.open.len()
    }

    fn finish(mut self) -> RawEntry {
        while self.depth() > 0 {
            self.close();
        }
        self.entry
    }
}

fn element_name(qualified: &[u8]) -> String {
    String::from_utf8_lossy(qualified).to_lowercase()
}

fn is_entry_element(name: &str) -> bool {
    matches!(name.rsplit(':').next(), Some("item") | Some("entry"))
}

fn attributes(e: &BytesStart) -> HashMap<String, String> {
    let mut attrs = e.attributes();
    attrs.with_checks(false);
    attrs
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_lowercase();
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            let value = unescape(&raw).map(|v| v.into_owned()).unwrap_or(raw);
            (key, value)
        })
        .collect()
}

/// Parse a feed document into raw entries.
///
/// Malformed documents are tolerated as far as possible: end-tag mismatches are
/// ignored, a bare `&` is kept as text, and an error after at least one complete entry keeps the entries
/// read so far.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] when the document breaks before any entry
/// could be read.
pub fn parse_feed(body: &str) -> Result<Vec<RawEntry>, FetchError> {
    let mut reader = Reader::from_str(body);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_dangling_amp = true;

    let mut entries = Vec::new();
    let mut current: Option<EntryBuilder> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(e.name().as_ref());
                match current.as_mut() {
                    Some(builder) => builder.open(&name, attributes(&e)),
                    None if is_entry_element(&name) => current = Some(EntryBuilder::default()),
                    None => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(builder) = current.as_mut() {
                    let name = element_name(e.name().as_ref());
                    builder.open(&name, attributes(&e));
                    builder.close();
                }
            }
            Ok(Event::End(_)) => {
                if let Some(mut builder) = current.take() {
                    if builder.depth() == 0 {
                        entries.push(builder.finish());
                    } else {
                        builder.close();
                        current = Some(builder);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(builder) = current.as_mut() {
                    builder.append(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(builder) = current.as_mut() {
                    builder.append(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::GeneralRef(r)) => {
                if let Some(builder) = current.as_mut() {
                    builder.append(&format!("&{};", String::from_utf8_lossy(&r)));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                let position = reader.buffer_position();
                if entries.is_empty() {
                    return Err(FetchError::Parse(format!("{} at byte {}", e, position)));
                }
                warn!(error = %e, position, kept = entries.len(), "Feed truncated by XML error; keeping entries read so far");
                break;
            }
        }
    }

    if let Some(builder) = current.take() {
        let entry = builder.finish();
        if !entry.is_empty() {
            entries.push(entry);
        }
    }

    Ok(entries)
}
