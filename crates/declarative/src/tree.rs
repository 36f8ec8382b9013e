//! Attribute trees and structural decode/encode.
//!
//! An [`AttributeTree`] holds the top-level attributes of one resource
//! instance. Models are decoded from a tree with a [`Reader`], which records
//! a path-aware diagnostic for every field it cannot decode, and encoded
//! back with a [`Writer`].

use crate::diagnostics::{Diagnostic, DiagnosticCategory, Diagnostics};
use crate::value::{Attr, Value};
use scalar::{Decimal, Duration, Ratio, RawJson, ScalarCodec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

static NULL: Value = Value::Null;

/// Desired or observed state of one resource instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeTree(BTreeMap<String, Value>);

impl AttributeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// The named attribute, `Null` when absent.
    pub fn get(&self, name: &str) -> &Value {
        self.0.get(name).unwrap_or(&NULL)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub const fn entries(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}

impl From<BTreeMap<String, Value>> for AttributeTree {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self(entries)
    }
}

impl FromIterator<(String, Value)> for AttributeTree {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One step of an [`AttributePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Attr(String),
    Index(usize),
    Key(String),
}

/// Location of a value inside a tree, e.g. `step[1].targets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttributePath(Vec<PathStep>);

impl AttributePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathStep::Attr(name.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathStep::Index(index));
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathStep::Key(key.into()));
        self
    }

    /// `self` followed by every step of `rest`.
    pub fn join(&self, rest: &Self) -> Self {
        let mut steps = self.0.clone();
        steps.extend(rest.0.iter().cloned());
        Self(steps)
    }

    fn prepend(mut self, step: PathStep) -> Self {
        self.0.insert(0, step);
        self
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Attr(name) if i == 0 => f.write_str(name)?,
                PathStep::Attr(name) => write!(f, ".{name}")?,
                PathStep::Index(index) => write!(f, "[{index}]")?,
                PathStep::Key(key) => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}

/// Why a value could not be decoded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeErrorKind {
    #[error("expected {expected}, found {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    Invalid(#[from] scalar::Error),
    #[error("{0}")]
    Other(String),
}

/// A decode failure at a path relative to the value being decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    pub path: AttributePath,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn wrong_kind(expected: &'static str, found: &Value) -> Self {
        DecodeErrorKind::WrongKind {
            expected,
            found: found.kind(),
        }
        .into()
    }

    pub fn other(message: impl Into<String>) -> Self {
        DecodeErrorKind::Other(message.into()).into()
    }

    fn at(self, step: PathStep) -> Self {
        Self {
            path: self.path.prepend(step),
            kind: self.kind,
        }
    }

    /// Convert into a diagnostic anchored under `base`.
    pub fn into_diagnostic(self, base: &AttributePath) -> Diagnostic {
        let path = base.join(&self.path);
        match self.kind {
            DecodeErrorKind::Invalid(err) => Diagnostic::error(
                DiagnosticCategory::Validation,
                format!("invalid {}", scalar_label(&err)),
                err.to_string(),
            )
            .with_path(path),
            kind => Diagnostic::error(
                DiagnosticCategory::Decode,
                "attribute does not match schema",
                kind.to_string(),
            )
            .with_path(path),
        }
    }
}

impl From<DecodeErrorKind> for DecodeError {
    fn from(kind: DecodeErrorKind) -> Self {
        Self {
            path: AttributePath::root(),
            kind,
        }
    }
}

impl From<scalar::Error> for DecodeError {
    fn from(err: scalar::Error) -> Self {
        DecodeErrorKind::Invalid(err).into()
    }
}

fn scalar_label(err: &scalar::Error) -> &'static str {
    match err {
        scalar::Error::InvalidDuration { .. } => Duration::KIND,
        scalar::Error::InvalidJson { .. } => RawJson::KIND,
        scalar::Error::InvalidDecimal { .. }
        | scalar::Error::ScaleExceeded { .. }
        | scalar::Error::OutOfRange { .. } => Decimal::KIND,
    }
}

/// Decode a typed value from a known attribute value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, DecodeError>;
}

/// Encode a typed value as an attribute value.
pub trait IntoValue {
    fn to_value(&self) -> Value;
}

/// Encode an attribute, keeping null and unknown.
pub fn attr_value<T: IntoValue>(attr: &Attr<T>) -> Value {
    match attr {
        Attr::Null => Value::Null,
        Attr::Unknown => Value::Unknown,
        Attr::Known(v) => v.to_value(),
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DecodeError::wrong_kind("string", value))
    }
}

impl IntoValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_bool()
            .ok_or_else(|| DecodeError::wrong_kind("bool", value))
    }
}

impl IntoValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Number(n) if n.scale() == 0 => n
                .to_string()
                .parse()
                .map_err(|_| DecodeError::other(format!("{n} does not fit in an integer"))),
            other => Err(DecodeError::wrong_kind("int", other)),
        }
    }
}

impl IntoValue for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Int(i) => Ok(Decimal::from(*i)),
            Value::String(s) => Ok(Decimal::parse(s)?),
            other => Err(DecodeError::wrong_kind(Decimal::KIND, other)),
        }
    }
}

impl IntoValue for Decimal {
    fn to_value(&self) -> Value {
        Value::Number(*self)
    }
}

impl FromValue for Ratio {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(s) => Ok(Ratio::parse(s)?),
            Value::Number(_) | Value::Int(_) => Ok(Ratio::new(Decimal::from_value(value)?)?),
            other => Err(DecodeError::wrong_kind(Ratio::KIND, other)),
        }
    }
}

/// Ratios are stored in their four-place text form.
impl IntoValue for Ratio {
    fn to_value(&self) -> Value {
        Value::String(self.canonical())
    }
}

impl FromValue for Duration {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(s) => Ok(Duration::parse(s)?),
            other => Err(DecodeError::wrong_kind(Duration::KIND, other)),
        }
    }
}

impl IntoValue for Duration {
    fn to_value(&self) -> Value {
        Value::String(self.canonical())
    }
}

impl FromValue for RawJson {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(s) => Ok(RawJson::parse(s)?),
            other => Err(DecodeError::wrong_kind(RawJson::KIND, other)),
        }
    }
}

/// Documents keep the text they were written with.
impl IntoValue for RawJson {
    fn to_value(&self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let items = match value {
            Value::List(items) => items,
            other => return Err(DecodeError::wrong_kind("list", other)),
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| T::from_value(item).map_err(|e| e.at(PathStep::Index(i))))
            .collect()
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(IntoValue::to_value).collect())
    }
}

impl<T: FromValue + Ord> FromValue for BTreeSet<T> {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let items = value
            .as_elements()
            .ok_or_else(|| DecodeError::wrong_kind("set", value))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| T::from_value(item).map_err(|e| e.at(PathStep::Index(i))))
            .collect()
    }
}

impl<T: IntoValue> IntoValue for BTreeSet<T> {
    fn to_value(&self) -> Value {
        Value::set(self.iter().map(IntoValue::to_value))
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let entries = value
            .as_entries()
            .ok_or_else(|| DecodeError::wrong_kind("map", value))?;
        entries
            .iter()
            .map(|(k, v)| {
                T::from_value(v)
                    .map(|decoded| (k.clone(), decoded))
                    .map_err(|e| e.at(PathStep::Key(k.clone())))
            })
            .collect()
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
    }
}

/// Field-by-field decoder over one object level.
pub struct Reader<'a> {
    entries: &'a BTreeMap<String, Value>,
    base: AttributePath,
    diagnostics: Diagnostics,
}

impl<'a> Reader<'a> {
    pub fn new(tree: &'a AttributeTree) -> Self {
        Self::nested(tree.entries(), AttributePath::root())
    }

    fn nested(entries: &'a BTreeMap<String, Value>, base: AttributePath) -> Self {
        Self {
            entries,
            base,
            diagnostics: Diagnostics::new(),
        }
    }

    fn value(&self, name: &str) -> &'a Value {
        self.entries.get(name).unwrap_or(&NULL)
    }

    /// Decode an optional attribute. Decode failures are recorded and read as `Null`.
    pub fn optional<T: FromValue>(&mut self, name: &str) -> Attr<T> {
        match self.value(name) {
            Value::Null => Attr::Null,
            Value::Unknown => Attr::Unknown,
            value => match T::from_value(value) {
                Ok(decoded) => Attr::Known(decoded),
                Err(err) => {
                    let base = self.base.clone().attr(name);
                    self.diagnostics.push(err.into_diagnostic(&base));
                    Attr::Null
                }
            },
        }
    }

    /// Decode an attribute that must be present (it may still be unknown).
    pub fn required<T: FromValue>(&mut self, name: &str) -> Attr<T> {
        if self.value(name).is_null() {
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticCategory::Decode,
                    "missing required attribute",
                    format!("{name:?} must be set"),
                )
                .with_path(self.base.clone().attr(name)),
            );
            return Attr::Null;
        }
        self.optional(name)
    }

    /// Decode a list of nested blocks with `decode`.
    pub fn blocks<T>(&mut self, name: &str, decode: impl Fn(&mut Reader<'a>) -> T) -> Attr<Vec<T>> {
        let items = match self.value(name) {
            Value::Null => return Attr::Null,
            Value::Unknown => return Attr::Unknown,
            Value::List(items) | Value::Set(items) => items,
            other => {
                let err = DecodeError::wrong_kind("list of blocks", other);
                let base = self.base.clone().attr(name);
                self.diagnostics.push(err.into_diagnostic(&base));
                return Attr::Null;
            }
        };

        let mut blocks = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let path = self.base.clone().attr(name).index(i);
            match item {
                Value::Object(entries) => {
                    let mut child = Reader::nested(entries, path);
                    blocks.push(decode(&mut child));
                    self.diagnostics.extend(child.diagnostics);
                }
                other => {
                    let err = DecodeError::wrong_kind("object", other);
                    self.diagnostics.push(err.into_diagnostic(&path));
                }
            }
        }
        Attr::Known(blocks)
    }

    /// Return the model, or every diagnostic recorded while reading it.
    pub fn finish<T>(self, model: T) -> Result<T, Diagnostics> {
        if self.diagnostics.has_error() {
            Err(self.diagnostics)
        } else {
            Ok(model)
        }
    }
}

/// Field-by-field encoder over one object level.
#[derive(Debug, Default)]
pub struct Writer {
    entries: BTreeMap<String, Value>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: IntoValue>(&mut self, name: &str, attr: &Attr<T>) -> &mut Self {
        self.entries.insert(name.to_string(), attr_value(attr));
        self
    }

    pub fn blocks<T>(
        &mut self,
        name: &str,
        attr: &Attr<Vec<T>>,
        encode: impl Fn(&T, &mut Writer),
    ) -> &mut Self {
        let value = match attr {
            Attr::Null => Value::Null,
            Attr::Unknown => Value::Unknown,
            Attr::Known(blocks) => Value::List(
                blocks
                    .iter()
                    .map(|block| {
                        let mut child = Writer::new();
                        encode(block, &mut child);
                        Value::Object(child.entries)
                    })
                    .collect(),
            ),
        };
        self.entries.insert(name.to_string(), value);
        self
    }

    pub fn finish(self) -> AttributeTree {
        AttributeTree(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Step {
        delay: Attr<Duration>,
        targets: Attr<BTreeSet<String>>,
    }

    #[derive(Debug, PartialEq)]
    struct Policy {
        name: Attr<String>,
        repeat: Attr<i64>,
        steps: Attr<Vec<Step>>,
    }

    fn read_policy(tree: &AttributeTree) -> Result<Policy, Diagnostics> {
        let mut r = Reader::new(tree);
        let policy = Policy {
            name: r.required("name"),
            repeat: r.optional("repeat"),
            steps: r.blocks("step", |b| Step {
                delay: b.required("delay"),
                targets: b.optional("targets"),
            }),
        };
        r.finish(policy)
    }

    fn write_policy(policy: &Policy) -> AttributeTree {
        let mut w = Writer::new();
        w.set("name", &policy.name).set("repeat", &policy.repeat);
        w.blocks("step", &policy.steps, |step, b| {
            b.set("delay", &step.delay).set("targets", &step.targets);
        });
        w.finish()
    }

    fn step(delay: &str, targets: &[&str]) -> Value {
        let mut entries = BTreeMap::new();
        entries.insert("delay".to_string(), Value::string(delay));
        entries.insert(
            "targets".to_string(),
            Value::set(targets.iter().map(|t| Value::from(*t))),
        );
        Value::Object(entries)
    }

    #[test]
    fn test_reader_writer_round_trip() {
        let mut tree = AttributeTree::new();
        tree.set("name", "oncall".into());
        tree.set("repeat", Value::Unknown);
        tree.set("step", Value::List(vec![step("5m", &["1", "2"]), step("1h", &[])]));

        let policy = read_policy(&tree).unwrap();
        assert_eq!(policy.repeat, Attr::Unknown);
        assert_eq!(policy.steps.known().unwrap()[0].delay, Attr::Known(Duration::from_secs(300)));

        let encoded = write_policy(&policy);
        assert_eq!(encoded.get("repeat"), &Value::Unknown);
        assert_eq!(read_policy(&encoded).unwrap(), policy);
    }

    #[test]
    fn test_missing_required_attribute() {
        let tree = AttributeTree::new();
        let diags = read_policy(&tree).unwrap_err();
        let err = diags.first_error().unwrap();
        assert_eq!(err.category, DiagnosticCategory::Decode);
        assert_eq!(err.path.as_ref().unwrap().to_string(), "name");
    }

    #[test]
    fn test_nested_validation_error_has_path() {
        let mut tree = AttributeTree::new();
        tree.set("name", "oncall".into());
        tree.set("step", Value::List(vec![step("5m", &[]), step("5 minutes", &[])]));

        let diags = read_policy(&tree).unwrap_err();
        let err = diags.first_error().unwrap();
        assert_eq!(err.category, DiagnosticCategory::Validation);
        assert_eq!(err.path.as_ref().unwrap().to_string(), "step[1].delay");
        assert!(err.detail.contains("5 minutes"));
    }

    #[test]
    fn test_wrong_kind() {
        let mut tree = AttributeTree::new();
        tree.set("name", Value::Int(3));
        let diags = read_policy(&tree).unwrap_err();
        assert!(diags.first_error().unwrap().detail.contains("expected string, found int"));
    }

    #[test]
    fn test_collection_element_paths() {
        let value = Value::List(vec![Value::Int(1), Value::string("x")]);
        let err = Vec::<i64>::from_value(&value).unwrap_err();
        assert_eq!(err.path.to_string(), "[1]");

        let mut entries = BTreeMap::new();
        entries.insert("k".to_string(), Value::Bool(true));
        let err = BTreeMap::<String, String>::from_value(&Value::Map(entries)).unwrap_err();
        assert_eq!(err.path.to_string(), "[\"k\"]");
    }

    #[test]
    fn test_scalar_encodings_are_canonical() {
        let ratio = Ratio::from_value(&Value::Number(Decimal::parse("0.99").unwrap())).unwrap();
        assert_eq!(ratio.to_value(), Value::string("0.9900"));

        let duration = Duration::from_value(&Value::string("1s500ms")).unwrap();
        assert_eq!(duration.to_value(), Value::string("1.5s"));

        let doc = <RawJson as FromValue>::from_value(&Value::string("{ \"a\": 1 }")).unwrap();
        assert_eq!(doc.to_value(), Value::string("{ \"a\": 1 }"));
    }

    #[test]
    fn test_int_accepts_integral_numbers() {
        let n = Value::Number(Decimal::parse("42").unwrap());
        assert_eq!(i64::from_value(&n).unwrap(), 42);
        let frac = Value::Number(Decimal::parse("4.2").unwrap());
        assert!(i64::from_value(&frac).is_err());
    }
}
