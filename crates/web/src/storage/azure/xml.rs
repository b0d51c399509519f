//! Just enough XML for the queue and file service payloads.
//!
//! Those responses are flat documents with known element names, so elements
//! are located textually rather than with a full parser.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").expect("Invalid regex")
});

/// Escape text for use as element content.
#[must_use]
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Resolve predefined and numeric character references.
///
/// Unknown or invalid references are left as they are.
#[must_use]
pub fn unescape(text: &str) -> Cow<'_, str> {
    ENTITY_RE.replace_all(text, |caps: &Captures<'_>| {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let entity = caps.get(1).map_or("", |m| m.as_str());
        let resolved = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map_or_else(
                    || entity.strip_prefix('#').and_then(|d| d.parse().ok()),
                    |hex| u32::from_str_radix(hex, 16).ok(),
                )
                .and_then(char::from_u32),
        };
        resolved.map_or_else(|| whole.to_owned(), String::from)
    })
}

/// Raw content of the first `<name>..</name>` element, if any.
///
/// Self-closing elements count as absent.
#[must_use]
pub fn child<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = xml.find(&open)? + open.len();
    let rest = xml.get(start..)?;
    rest.get(..rest.find(&close)?)
}

/// Unescaped text of the first `<name>` element, if any.
#[must_use]
pub fn child_text(xml: &str, name: &str) -> Option<String> {
    child(xml, name).map(|raw| unescape(raw).into_owned())
}
