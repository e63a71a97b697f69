//! Canonical XML serialization
//!
//! Inclusive Canonical XML 1.1 without comments, applied to a whole
//! document. The output drops the declaration, the DTD and comments, writes
//! every element as a start/end pair, emits a namespace declaration only
//! where the binding changes, orders namespaces before attributes (default
//! namespace first, then by prefix; attributes by namespace URI then local
//! name) and uses the canonical escaping rules for text and attribute values.
//!
//! The invoice builder writes this form directly, so canonicalizing one of
//! its documents returns the same bytes.

use std::borrow::Cow;
use std::collections::BTreeMap;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ComplianceError;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix to namespace URI; the default namespace is keyed by `""`
type Bindings = BTreeMap<String, String>;

/// Escapes character data as canonical XML writes it
pub fn escape_text(value: &str) -> Cow<'_, str> {
    escape_with(value, |c| match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '\r' => Some("&#xD;"),
        _ => None,
    })
}

/// Escapes an attribute value as canonical XML writes it (double-quoted)
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    escape_with(value, |c| match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '"' => Some("&quot;"),
        '\t' => Some("&#x9;"),
        '\n' => Some("&#xA;"),
        '\r' => Some("&#xD;"),
        _ => None,
    })
}

fn escape_with(value: &str, replacement: impl Fn(char) -> Option<&'static str>) -> Cow<'_, str> {
    let Some(first) = value.find(|c: char| replacement(c).is_some()) else {
        return Cow::Borrowed(value);
    };

    let mut out = String::with_capacity(value.len() + 16);
    out.push_str(&value[..first]);
    for c in value[first..].chars() {
        match replacement(c) {
            Some(escaped) => out.push_str(escaped),
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Canonical form of a complete XML document
pub fn canonicalize(xml: &str) -> Result<String, ComplianceError> {
    let mut reader = Reader::from_str(xml);
    reader.expand_empty_elements(true);

    let mut out = String::with_capacity(xml.len());
    // Bindings in scope for each open element, document level first
    let mut scopes: Vec<Bindings> = vec![Bindings::new()];
    let mut seen_root = false;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(element) => {
                let parent = scopes.last().cloned().unwrap_or_default();
                let scope = write_start_tag(&mut out, &element, &parent)?;
                scopes.push(scope);
                seen_root = true;
            }
            Event::End(element) => {
                if scopes.len() < 2 {
                    return Err(malformed("end tag without a matching start tag"));
                }
                scopes.pop();
                out.push_str("</");
                out.push_str(utf8(element.name().as_ref())?);
                out.push('>');
            }
            Event::Text(text) if scopes.len() > 1 => {
                let raw = normalize_line_endings(utf8(&text)?);
                let value = unescape(&raw).map_err(malformed)?;
                out.push_str(&escape_text(&value));
            }
            Event::CData(data) if scopes.len() > 1 => {
                let raw = normalize_line_endings(utf8(&data)?);
                out.push_str(&escape_text(&raw));
            }
            Event::PI(instruction) => {
                let outside_root = scopes.len() == 1;
                if outside_root && seen_root {
                    out.push('\n');
                }
                out.push_str("<?");
                out.push_str(utf8(&instruction)?);
                out.push_str("?>");
                if outside_root && !seen_root {
                    out.push('\n');
                }
            }
            Event::Eof => break,
            // Declaration, DTD, comments, whitespace around the root
            _ => {}
        }
    }

    if !seen_root || scopes.len() != 1 {
        return Err(malformed("document has no complete root element"));
    }
    Ok(out)
}

/// Writes one start tag and returns the bindings in scope inside it
fn write_start_tag(
    out: &mut String,
    element: &BytesStart<'_>,
    parent: &Bindings,
) -> Result<Bindings, ComplianceError> {
    let mut scope = parent.clone();
    let mut attributes = Vec::new();

    for attribute in element.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let name = utf8(attribute.key.as_ref())?.to_string();
        let value = attribute_value(&attribute.value)?;
        if name == "xmlns" {
            scope.insert(String::new(), value);
        } else if let Some(prefix) = name.strip_prefix("xmlns:") {
            scope.insert(prefix.to_string(), value);
        } else {
            attributes.push((name, value));
        }
    }

    let mut sorted = Vec::with_capacity(attributes.len());
    for (name, value) in attributes {
        let (namespace, local) = match name.split_once(':') {
            Some(("xml", local)) => (XML_NS.to_string(), local.to_string()),
            Some((prefix, local)) => {
                let namespace = scope
                    .get(prefix)
                    .cloned()
                    .ok_or_else(|| malformed(format!("attribute prefix {} is not bound", prefix)))?;
                (namespace, local.to_string())
            }
            None => (String::new(), name.clone()),
        };
        sorted.push((namespace, local, name, value));
    }
    sorted.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

    out.push('<');
    out.push_str(utf8(element.name().as_ref())?);

    // BTreeMap order puts the default namespace ("") ahead of every prefix
    for (prefix, uri) in &scope {
        let changed = match parent.get(prefix) {
            Some(inherited) => inherited != uri,
            None => !(prefix.is_empty() && uri.is_empty()),
        };
        if !changed {
            continue;
        }
        out.push_str(" xmlns");
        if !prefix.is_empty() {
            out.push(':');
            out.push_str(prefix);
        }
        out.push_str("=\"");
        out.push_str(&escape_attribute(uri));
        out.push('"');
    }

    for (_, _, name, value) in &sorted {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(value));
        out.push('"');
    }
    out.push('>');

    Ok(scope)
}

/// Attribute value after XML attribute-value normalization
fn attribute_value(raw: &[u8]) -> Result<String, ComplianceError> {
    let normalized = normalize_line_endings(utf8(raw)?).replace(['\t', '\n'], " ");
    Ok(unescape(&normalized).map_err(malformed)?.into_owned())
}

fn normalize_line_endings(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, ComplianceError> {
    std::str::from_utf8(bytes).map_err(malformed)
}

fn malformed(error: impl std::fmt::Display) -> ComplianceError {
    ComplianceError::structural(format!("Malformed XML: {}", error))
}
