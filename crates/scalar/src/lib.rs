//! # Scalar
//!
//! Exact scalar codecs for declarative state.
//!
//! Each type here has a text form that users write in configuration, a
//! canonical form the engine persists, and an equality that ignores
//! representational noise:
//!
//! - [`Duration`]: `1s500ms`, `1500ms` and `1.5s` are the same value
//! - [`Decimal`]: `0.9900` equals `0.99`, no binary floating point involved
//! - [`Ratio`]: a decimal in `[0, 1]` with at most four places, shown as `0.9900`
//! - [`RawJson`]: a JSON document compared structurally, displayed verbatim
//!
//! Parse failures carry the offending raw value ([`Error::value`]).

pub mod decimal;
pub mod duration;
pub mod error;
pub mod raw_json;

use std::fmt;

pub use decimal::{Decimal, Ratio};
pub use duration::Duration;
pub use error::{Error, Result};
pub use raw_json::RawJson;

/// A scalar with a text form that parses back to an equal value.
pub trait ScalarCodec: Sized + Clone + PartialEq + fmt::Display {
    /// Short name used in diagnostics ("duration", "ratio", ...).
    const KIND: &'static str;

    /// Parse from user-supplied text.
    fn parse_str(s: &str) -> Result<Self>;

    /// Canonical text persisted in state.
    fn canonical(&self) -> String {
        self.to_string()
    }
}
