//! Tolerant decoding of wire replies: XML bodies and header maps.
//!
//! The service may grow new fields over time, so unknown XML elements and
//! headers are never fatal; they are logged and skipped. Only a body that
//! does not parse, or that misses its expected root element, aborts a decode.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::error;

use crate::error::{ClientError, Result};

/// Prefix under which user-supplied object metadata headers travel.
pub const META_PREFIX: &str = "x-cos-meta-";

/// A decoded XML element: tag name, flattened text content and children.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// First immediate child with the given tag name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Parse `body` and return its root element, which must carry `root_tag`.
///
/// The offending body is logged on failure since the caller usually only
/// sees the typed error.
pub fn decode_xml(body: &[u8], root_tag: &str) -> Result<Element> {
    let text = match std::str::from_utf8(body) {
        Ok(text) => text,
        Err(_) => {
            error!(root = root_tag, "response body is not valid UTF-8");
            return Err(ClientError::MalformedBody(format!(
                "body for {} is not valid UTF-8",
                root_tag
            )));
        }
    };

    let roots = match parse_document(text) {
        Ok(roots) => roots,
        Err(err) => {
            error!(root = root_tag, body = text, "failed to parse XML body");
            return Err(err);
        }
    };

    match roots.into_iter().find(|el| el.name == root_tag) {
        Some(root) => Ok(root),
        None => {
            error!(root = root_tag, body = text, "missing expected root node");
            Err(ClientError::MalformedBody(format!(
                "missing root node {}",
                root_tag
            )))
        }
    }
}

/// Build an element tree from the document's top-level elements.
fn parse_document(text: &str) -> Result<Vec<Element>> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    // Sentinel holds the top-level elements; real elements stack above it.
    let mut stack = vec![Element::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                stack.push(Element {
                    name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
                    ..Element::default()
                });
            }
            Ok(Event::Empty(start)) => {
                let element = Element {
                    name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
                    ..Element::default()
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Ok(Event::Text(text)) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| ClientError::MalformedBody(e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&unescaped);
                }
            }
            Ok(Event::End(_)) => {
                let element = match stack.pop() {
                    Some(element) if !stack.is_empty() => element,
                    _ => return Err(ClientError::MalformedBody("unbalanced end tag".into())),
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ClientError::MalformedBody(e.to_string())),
        }
    }

    if stack.len() != 1 {
        return Err(ClientError::MalformedBody("unclosed element".into()));
    }
    let sentinel = stack.remove(0);
    Ok(sentinel.children)
}

/// Integer coercion. Malformed numeric text decodes as zero rather than
/// aborting the rest of the document.
pub fn parse_u64(text: &str) -> u64 {
    text.trim().parse().unwrap_or(0)
}

/// Boolean coercion: only the literal `true` is truthy.
pub fn parse_bool(text: &str) -> bool {
    text.trim() == "true"
}

/// Look up a known response header. Transport implementations normalize
/// names to lowercase, so the fixed tables use lowercase names and the
/// comparison itself stays exact.
pub fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers.get(name).map(String::as_str)
}

/// Same as [`header`] but defaults to the empty string.
pub fn header_or_empty(headers: &HashMap<String, String>, name: &str) -> String {
    header(headers, name).unwrap_or_default().to_string()
}

/// Collect `x-cos-meta-*` headers into an open map, prefix stripped, so
/// arbitrary user metadata round-trips.
pub fn user_metadata(headers: &HashMap<String, String>) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    for (name, value) in headers {
        if let Some(stripped) = name.strip_prefix(META_PREFIX) {
            metadata.insert(stripped.to_string(), value.clone());
        }
    }
    metadata
}
