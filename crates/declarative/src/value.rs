//! Dynamically typed attribute values.
//!
//! [`Value`] is the leaf-and-branch type of an attribute tree. It keeps
//! `Null` (absent) and `Unknown` (not known until apply) distinct from every
//! known value, including empty strings and empty collections.
//!
//! [`Attr`] is the typed counterpart used in per-kind models.

use scalar::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Unknown,
    Bool(bool),
    Int(i64),
    Number(Decimal),
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Unordered collection of distinct values.
    Set(Vec<Value>),
    /// String-keyed map with homogeneous values.
    Map(BTreeMap<String, Value>),
    /// Nested block with named attributes.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Build a set, dropping duplicates and ordering members canonically.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            if !members.contains(&item) {
                members.push(item);
            }
        }
        members.sort_by_cached_key(ToString::to_string);
        Self::Set(members)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Neither null nor unknown.
    pub const fn is_known(&self) -> bool {
        !self.is_null() && !self.is_unknown()
    }

    /// Name of the value kind, used in decode diagnostics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Elements of a list or a set.
    pub fn as_elements(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Entries of a map or an object.
    pub const fn as_entries(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(entries) | Self::Object(entries) => Some(entries),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) | (Self::Unknown, Self::Unknown) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            // Membership only: order and repeats do not matter.
            (Self::Set(a), Self::Set(b)) => {
                a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
            }
            (Self::Map(a), Self::Map(b)) | (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Unknown => f.write_str("(known after apply)"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) | Self::Set(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(entries) | Self::Object(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A typed attribute that may be absent or not yet known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Attr<T> {
    #[default]
    Null,
    Unknown,
    Known(T),
}

impl<T> Attr<T> {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub const fn known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attr<U> {
        match self {
            Self::Null => Attr::Null,
            Self::Unknown => Attr::Unknown,
            Self::Known(v) => Attr::Known(f(v)),
        }
    }

    /// `Null` for `None`, `Known` otherwise.
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Known)
    }
}

impl<T: Clone> Attr<T> {
    /// The known value, or `default` when null or unknown.
    pub fn value_or(&self, default: T) -> T {
        self.known().cloned().unwrap_or(default)
    }

    /// Keep `self` when known, otherwise fall back to `other`.
    pub fn or(&self, other: &Self) -> Self {
        if self.is_known() {
            self.clone()
        } else {
            other.clone()
        }
    }
}

impl<T> From<T> for Attr<T> {
    fn from(value: T) -> Self {
        Self::Known(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_unknown_and_empty_are_distinct() {
        assert_ne!(Value::Null, Value::Unknown);
        assert_ne!(Value::Null, Value::string(""));
        assert_ne!(Value::Null, Value::List(vec![]));
        assert_ne!(Value::Int(0), Value::Null);
        assert!(Value::string("").is_known());
        assert!(!Value::Unknown.is_known());
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let a = Value::Set(vec!["x".into(), "y".into()]);
        let b = Value::Set(vec!["y".into(), "x".into()]);
        assert_eq!(a, b);
        assert_ne!(Value::List(vec!["x".into(), "y".into()]), Value::List(vec!["y".into(), "x".into()]));
    }

    #[test]
    fn test_set_equality_compares_members() {
        let xxy = Value::Set(vec!["x".into(), "x".into(), "y".into()]);
        let xyy = Value::Set(vec!["x".into(), "y".into(), "y".into()]);
        let xy = Value::set(vec!["x".into(), "y".into()]);
        assert_eq!(xxy, xyy);
        assert_eq!(xxy, xy);
        assert_eq!(xy, xxy);

        let xyz = Value::Set(vec!["x".into(), "y".into(), "z".into()]);
        assert_ne!(xxy, xyz);
        assert_ne!(xyz, xxy);
    }

    #[test]
    fn test_set_constructor_dedups_and_sorts() {
        let set = Value::set(vec!["b".into(), "a".into(), "b".into()]);
        assert_eq!(set.as_elements().unwrap().len(), 2);
        assert_eq!(set.to_string(), r#"["a", "b"]"#);
    }

    #[test]
    fn test_serde_is_lossless() {
        let mut entries = BTreeMap::new();
        entries.insert("n".to_string(), Value::Number(Decimal::parse("0.99").unwrap()));
        entries.insert("i".to_string(), Value::Int(7));
        entries.insert("s".to_string(), Value::string("7"));
        entries.insert("u".to_string(), Value::Unknown);
        entries.insert("z".to_string(), Value::Null);
        let value = Value::Object(entries);

        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_attr_helpers() {
        let known: Attr<i64> = Attr::Known(3);
        assert_eq!(known.value_or(9), 3);
        assert_eq!(Attr::<i64>::Null.value_or(9), 9);
        assert_eq!(Attr::<i64>::Unknown.value_or(9), 9);
        assert_eq!(Attr::<i64>::Null.or(&known), known);
        assert_eq!(Attr::from_option(None::<i64>), Attr::Null);
        assert_eq!(known.map(|v| v * 2), Attr::Known(6));
    }
}
