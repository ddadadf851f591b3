//! Tag value types for metaprobe.
//!
//! This module defines the two value representations the engine works with:
//! `TagValue`, the untyped variant a format decoder hands us (anything from a
//! plain string to a rational pair or a raw byte run), and `MetaValue`, the
//! cleaned, serialization-safe variant that ends up in the final record.
//!
//! The coercion from `TagValue` to `MetaValue` implements the cleaning rules
//! shared by the whole engine: byte decoding with a Latin-1 fallback,
//! rational-to-number conversion with a zero-denominator guard, control
//! character stripping, and collapsing of single-element lists.

use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A raw, source-specific tag mapping as produced by a format decoder.
///
/// Keys are not unique across sources ("EXIF:Make" and "Make" may both be
/// present); aliasing is resolved later by the normalizer and identifiers.
pub type RawTagMap = HashMap<String, TagValue>;

/// The canonical metadata record: lexically ordered, clean values only.
pub type MetadataRecord = BTreeMap<String, MetaValue>;

/// An untyped tag value as delivered by a format-specific decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Numerator/denominator pair, e.g. an EXIF rational.
    Rational(i64, i64),
    Bytes(Vec<u8>),
    List(Vec<TagValue>),
    Map(HashMap<String, TagValue>),
}

/// A cleaned value in the canonical record.
///
/// Restricted to plain scalars, lists, and nested records so the record
/// serializes losslessly to JSON/YAML without opaque references.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<MetaValue>),
    Record(BTreeMap<String, MetaValue>),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Text(s) => write!(f, "{}", s),
            MetaValue::Integer(n) => write!(f, "{}", n),
            MetaValue::Float(n) => write!(f, "{}", n),
            MetaValue::Boolean(b) => write!(f, "{}", b),
            MetaValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            MetaValue::Record(map) => {
                let parts: Vec<String> =
                    map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value, accepting numbers and numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Integer(n) => Some(*n as f64),
            MetaValue::Float(n) => Some(*n),
            MetaValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Integer(n) => Some(*n),
            MetaValue::Float(n) => Some(*n as i64),
            MetaValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<f64> for MetaValue {
    fn from(n: f64) -> Self {
        MetaValue::Float(n)
    }
}

impl From<i64> for MetaValue {
    fn from(n: i64) -> Self {
        MetaValue::Integer(n)
    }
}

/// Strip NUL bytes and ASCII control characters (keeping tab), then collapse
/// whitespace runs to a single space and trim.
pub fn clean_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|&c| c == '\t' || c == ' ' || !c.is_control())
        .collect();

    let mut out = String::with_capacity(stripped.len());
    let mut in_space = false;
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }

    out.trim().to_string()
}

/// Decode a byte run as text: UTF-8 first, Latin-1 as the fallback.
///
/// Returns `None` when the cleaned result is empty (binary junk decodes to
/// control characters which the cleaner removes).
pub fn decode_bytes(bytes: &[u8]) -> Option<String> {
    let decoded = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        // Latin-1 maps every byte to the code point of the same value.
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    };

    let cleaned = clean_text(&decoded);
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

impl TagValue {
    /// Coerce a raw value into its clean canonical form.
    ///
    /// Returns `None` for values that carry no information after cleaning:
    /// empty strings, undecodable bytes, empty lists and maps. A rational
    /// with a zero denominator coerces to integer `0` rather than faulting.
    pub fn clean(&self) -> Option<MetaValue> {
        match self {
            TagValue::Text(s) => {
                let cleaned = clean_text(s);
                if cleaned.is_empty() {
                    None
                } else {
                    Some(MetaValue::Text(cleaned))
                }
            }
            TagValue::Integer(n) => Some(MetaValue::Integer(*n)),
            TagValue::Float(n) => Some(MetaValue::Float(*n)),
            TagValue::Boolean(b) => Some(MetaValue::Boolean(*b)),
            TagValue::Rational(_, 0) => Some(MetaValue::Integer(0)),
            TagValue::Rational(n, 1) => Some(MetaValue::Integer(*n)),
            TagValue::Rational(n, d) => Some(MetaValue::Float(*n as f64 / *d as f64)),
            TagValue::Bytes(bytes) => decode_bytes(bytes).map(MetaValue::Text),
            TagValue::List(items) => {
                let cleaned: Vec<MetaValue> =
                    items.iter().filter_map(|item| item.clean()).collect();
                match cleaned.len() {
                    0 => None,
                    1 => Some(cleaned.into_iter().next().unwrap()),
                    _ => Some(MetaValue::List(cleaned)),
                }
            }
            TagValue::Map(map) => {
                let cleaned: BTreeMap<String, MetaValue> = map
                    .iter()
                    .filter_map(|(k, v)| v.clean().map(|cv| (k.clone(), cv)))
                    .collect();
                if cleaned.is_empty() {
                    None
                } else {
                    Some(MetaValue::Record(cleaned))
                }
            }
        }
    }
}

impl From<serde_json::Value> for TagValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => TagValue::Text(String::new()),
            serde_json::Value::Bool(b) => TagValue::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    TagValue::Integer(i)
                } else {
                    TagValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => TagValue::Text(s),
            serde_json::Value::Array(items) => {
                TagValue::List(items.into_iter().map(TagValue::from).collect())
            }
            serde_json::Value::Object(map) => TagValue::Map(
                map.into_iter().map(|(k, v)| (k, TagValue::from(v))).collect(),
            ),
        }
    }
}

/// Build a raw tag map from a decoder's JSON output.
///
/// The top level must be an object; anything else is a structural error
/// rather than a partial record, since downstream stages assume a mapping.
pub fn raw_tag_map_from_json(value: serde_json::Value) -> Result<RawTagMap> {
    match value {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, TagValue::from(v)))
            .collect()),
        other => bail!("Invalid input: expected a tag mapping, got {}", json_kind(&other)),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
