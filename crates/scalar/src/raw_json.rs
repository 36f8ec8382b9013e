//! Raw JSON documents.
//!
//! A [`RawJson`] keeps the text the user wrote alongside its parsed value.
//! Two documents are equal when their parsed values are equal, so whitespace
//! and key order never produce a diff. Display returns the original text.

use crate::ScalarCodec;
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct RawJson {
    text: String,
    value: serde_json::Value,
}

impl RawJson {
    pub fn parse(text: &str) -> Result<Self> {
        let value = serde_json::from_str(text).map_err(|e| Error::InvalidJson {
            value: text.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            text: text.to_string(),
            value,
        })
    }

    /// Wrap an already parsed value; the text is its compact rendering.
    pub fn from_value(value: serde_json::Value) -> Self {
        Self {
            text: value.to_string(),
            value,
        }
    }

    /// The empty object `{}`.
    pub fn empty_object() -> Self {
        Self::from_value(serde_json::Value::Object(serde_json::Map::new()))
    }

    /// The text as originally written.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub const fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Same value, pretty-printed with two-space indentation.
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.value).unwrap_or_else(|_| self.text.clone())
    }
}

impl PartialEq for RawJson {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for RawJson {}

impl fmt::Display for RawJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for RawJson {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl ScalarCodec for RawJson {
    const KIND: &'static str = "json";

    fn parse_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }

    fn canonical(&self) -> String {
        self.value.to_string()
    }
}

impl Serialize for RawJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RawJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_formatting_and_key_order() {
        let a = RawJson::parse(r#"{"a": 1, "b": [true, null]}"#).unwrap();
        let b = RawJson::parse("{\n  \"b\": [true, null],\n  \"a\": 1\n}").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, RawJson::parse(r#"{"a": 2, "b": [true, null]}"#).unwrap());
    }

    #[test]
    fn test_display_keeps_original_text() {
        let text = "{ \"z\" : 1 }";
        let doc = RawJson::parse(text).unwrap();
        assert_eq!(doc.to_string(), text);
        assert_eq!(doc.canonical(), r#"{"z":1}"#);
    }

    #[test]
    fn test_invalid_document() {
        let err = RawJson::parse("{not json").unwrap_err();
        assert!(matches!(err, Error::InvalidJson { .. }));
        assert_eq!(err.value(), "{not json");
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(RawJson::empty_object(), RawJson::parse("{ }").unwrap());
        assert_eq!(RawJson::empty_object().as_str(), "{}");
    }

    #[test]
    fn test_serde_embeds_value() {
        let doc = RawJson::parse(r#"{ "k": "v" }"#).unwrap();
        assert_eq!(serde_json::to_string(&doc).unwrap(), r#"{"k":"v"}"#);
        let back: RawJson = serde_json::from_str(r#"{"k":"v"}"#).unwrap();
        assert_eq!(back, doc);
    }
}
