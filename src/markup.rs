//! Placeholder traversal over rendered XML.
//!
//! The rendering engine hands over a document in which every image preview
//! is an element like:
//!
//! ```text
//! <UPL-IMAGE-PREVIEW uuid="abc" url="/files/a.png" alt="{TEXT?}"/>
//! ```
//!
//! [`replace_attributes`] finds each element with a given tag name, hands its
//! attributes to a callback in document order, and writes back whatever the
//! callback returns. Everything else in the document is copied through
//! unchanged.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use thiserror::Error;

/// Start tag or empty-element tag with quoted attributes.
const START_TAG_PATTERN: &str =
    r#"<([A-Za-z_][A-Za-z0-9_.:\-]*)((?:\s+[^\s=/>]+\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)>"#;

const ATTRIBUTE_PATTERN: &str = r#"([^\s=/>]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#;

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("invalid markup pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Attribute set of one element, ordered by name.
pub type Attributes = BTreeMap<String, String>;

/// Rewrite the attributes of every `<tag_name ...>` element in `xml`.
///
/// Attributes are re-serialized sorted by name with double quotes. Whether
/// the element was self-closing is preserved.
pub fn replace_attributes<F>(
    xml: &str,
    tag_name: &str,
    mut callback: F,
) -> Result<String, MarkupError>
where
    F: FnMut(Attributes) -> Attributes,
{
    let start_tag = Regex::new(START_TAG_PATTERN)?;
    let attribute = Regex::new(ATTRIBUTE_PATTERN)?;

    let rewritten = start_tag.replace_all(xml, |caps: &Captures| {
        if &caps[1] != tag_name {
            return caps[0].to_string();
        }
        let attrs = parse_attributes(&attribute, &caps[2]);
        let self_closing = !caps[3].is_empty();
        serialize_tag(tag_name, &callback(attrs), self_closing)
    });

    Ok(rewritten.into_owned())
}

fn parse_attributes(pattern: &Regex, raw: &str) -> Attributes {
    pattern
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            (caps[1].to_string(), decode_entities(value))
        })
        .collect()
}

fn serialize_tag(tag_name: &str, attrs: &Attributes, self_closing: bool) -> String {
    let mut out = format!("<{tag_name}");
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_xml(value));
        out.push('"');
    }
    out.push_str(if self_closing { "/>" } else { ">" });
    out
}

/// Escape a string for use inside a double-quoted XML attribute.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Decode the predefined XML entities and numeric character references.
///
/// Unknown or malformed references are kept verbatim.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').and_then(|end| Some((decode_entity(&tail[1..end])?, end))) {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let hex = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X"));
            let code = if let Some(hex) = hex {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}
