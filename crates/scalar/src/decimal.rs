//! Base-10 fixed-point scalars.
//!
//! [`Decimal`] compares by value (`0.9900 == 0.99`) and always formats in its
//! normalized, unpadded form. [`Ratio`] is a decimal in `[0, 1]` limited to
//! four decimal places and always formatted with exactly four places.

use crate::ScalarCodec;
use crate::error::{Error, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A fixed-point decimal number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(rust_decimal::Decimal);

impl Decimal {
    pub const ZERO: Self = Self(rust_decimal::Decimal::ZERO);
    pub const ONE: Self = Self(rust_decimal::Decimal::ONE);

    /// Wrap a `rust_decimal` value.
    pub const fn from_inner(inner: rust_decimal::Decimal) -> Self {
        Self(inner)
    }

    pub const fn inner(&self) -> rust_decimal::Decimal {
        self.0
    }

    /// Parse a plain decimal such as `0.99`, `-12`, or `+3.5`.
    ///
    /// Only ASCII digits, a single `.` and a leading sign are accepted:
    /// no exponents, no thousands separators, no locale-specific commas.
    pub fn parse(input: &str) -> Result<Self> {
        let unsigned = input.strip_prefix(['-', '+']).unwrap_or(input);
        let mut seen_dot = false;
        let mut digits = 0usize;
        for c in unsigned.chars() {
            match c {
                '0'..='9' => digits += 1,
                '.' if !seen_dot => seen_dot = true,
                _ => {
                    return Err(Error::decimal(
                        input,
                        format!("unexpected character {c:?}"),
                    ));
                }
            }
        }
        if digits == 0 {
            return Err(Error::decimal(input, "expected digits"));
        }

        let text = input.strip_prefix('+').unwrap_or(input);
        rust_decimal::Decimal::from_str_exact(text)
            .map(Self)
            .map_err(|e| Error::decimal(input, e.to_string()))
    }

    /// Convert a float through its shortest round-trip text form.
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::decimal(&value.to_string(), "not a finite number"));
        }
        Self::parse(&value.to_string())
    }

    /// Number of significant fractional digits (`0.9900` has scale 2).
    pub fn scale(&self) -> u32 {
        self.0.normalize().scale()
    }

    pub fn is_sign_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Format with exactly `places` fractional digits, rounding if needed.
    pub fn to_fixed(&self, places: u32) -> String {
        let mut value = self.0;
        value.rescale(places);
        value.to_string()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self(rust_decimal::Decimal::from(value))
    }
}

impl ScalarCodec for Decimal {
    const KIND: &'static str = "decimal";

    fn parse_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct DecimalVisitor;

impl Visitor<'_> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal number or a decimal string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Decimal, E> {
        Decimal::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Decimal, E> {
        Ok(Decimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Decimal, E> {
        Ok(Decimal(rust_decimal::Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Decimal, E> {
        Decimal::from_f64(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }
}

/// A ratio in `[0, 1]` with at most four decimal places, e.g. an SLA target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ratio(Decimal);

impl Ratio {
    /// Fixed number of decimal places in the canonical form.
    pub const PLACES: u32 = 4;

    /// Parse a ratio, rejecting more than four significant decimal places.
    pub fn parse(input: &str) -> Result<Self> {
        Self::check(Decimal::parse(input)?, input)
    }

    /// Validate a decimal as a ratio.
    pub fn new(value: Decimal) -> Result<Self> {
        Self::check(value, &value.to_string())
    }

    fn check(value: Decimal, raw: &str) -> Result<Self> {
        let scale = value.scale();
        if scale > Self::PLACES {
            return Err(Error::ScaleExceeded {
                value: raw.to_string(),
                scale,
                max: Self::PLACES,
            });
        }
        if value.is_sign_negative() || value > Decimal::ONE {
            return Err(Error::OutOfRange {
                value: raw.to_string(),
                reason: "expected a ratio between 0 and 1".to_string(),
            });
        }
        Ok(Self(value))
    }

    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_fixed(Self::PLACES))
    }
}

impl FromStr for Ratio {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl ScalarCodec for Ratio {
    const KIND: &'static str = "ratio";

    fn parse_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = deserializer.deserialize_any(DecimalVisitor)?;
        Ratio::new(value).map_err(de::Error::custom)
    }
}
