//! Error types for scalar parsing.
//!
//! Every variant carries the offending raw value verbatim so callers can
//! report it back to the user unchanged.

use thiserror::Error;

/// Result type alias for scalar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while parsing or converting scalar values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A duration string does not match the `<number><unit>` grammar.
    #[error("invalid duration {value:?}: {reason}")]
    InvalidDuration {
        /// The raw input.
        value: String,
        /// What went wrong.
        reason: String,
    },

    /// A decimal string is not a plain base-10 number.
    #[error("invalid decimal {value:?}: {reason}")]
    InvalidDecimal {
        /// The raw input.
        value: String,
        /// What went wrong.
        reason: String,
    },

    /// A decimal carries more fractional digits than allowed.
    #[error("decimal {value:?} has {scale} decimal places, at most {max} allowed")]
    ScaleExceeded {
        /// The raw input.
        value: String,
        /// Number of significant fractional digits found.
        scale: u32,
        /// Maximum allowed.
        max: u32,
    },

    /// A value is outside its permitted range.
    #[error("value {value:?} is out of range: {reason}")]
    OutOfRange {
        /// The raw input.
        value: String,
        /// The permitted range.
        reason: String,
    },

    /// A raw JSON document failed to parse.
    #[error("invalid JSON document: {reason}")]
    InvalidJson {
        /// The raw input.
        value: String,
        /// Parser message.
        reason: String,
    },
}

impl Error {
    pub(crate) fn duration(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decimal(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDecimal {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// The raw value that failed to parse.
    pub fn value(&self) -> &str {
        match self {
            Self::InvalidDuration { value, .. }
            | Self::InvalidDecimal { value, .. }
            | Self::ScaleExceeded { value, .. }
            | Self::OutOfRange { value, .. }
            | Self::InvalidJson { value, .. } => value,
        }
    }
}
