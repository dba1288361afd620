//! Payload classification: JSON, then XML, then plain text.
//!
//! Classification never fails. Anything that is not strict JSON and not a
//! well-formed XML document is text, and so is any payload nested deeper
//! than [`MAX_NESTING`] levels.

pub mod render;
pub mod xml;

pub use render::{HtmlRenderer, PlainRenderer, Renderer};
pub use xml::{XmlDocument, XmlError, XmlNode};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Format badge of a classified payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayloadFormat {
    Json,
    Xml,
    Text,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Json => "JSON",
            PayloadFormat::Xml => "XML",
            PayloadFormat::Text => "TEXT",
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload with its structured representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Parsed value; object keys keep their insertion order.
    Json(Value),
    Xml(XmlDocument),
    /// The original string, unchanged.
    Text(String),
}

impl Classified {
    pub fn format(&self) -> PayloadFormat {
        match self {
            Classified::Json(_) => PayloadFormat::Json,
            Classified::Xml(_) => PayloadFormat::Xml,
            Classified::Text(_) => PayloadFormat::Text,
        }
    }
}

/// Deepest array/object or element nesting that is parsed and rendered.
/// Deeper payloads are classified as text.
pub const MAX_NESTING: usize = 100;

pub fn classify(raw: &str) -> Classified {
    if json_depth_within(raw, MAX_NESTING) {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return Classified::Json(value);
        }
    }
    let trimmed = raw.trim();
    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        if let Ok(doc) = XmlDocument::parse(trimmed) {
            return Classified::Xml(doc);
        }
    }
    Classified::Text(raw.to_string())
}

/// Whether `[`/`{` nesting outside string literals stays within `max`.
fn json_depth_within(text: &str, max: usize) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for b in text.bytes() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                if depth > max {
                    return false;
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    true
}
