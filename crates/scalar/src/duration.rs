//! Elapsed-time scalar with a `<number><unit>` text form.
//!
//! Internally a duration is a signed count of nanoseconds. The text form is a
//! sequence of `<number><unit>` pairs that are summed, so `1s500ms`, `1500ms`
//! and `1.5s` all denote the same value. Formatting always produces the
//! canonical form (`1.5s`), which parses back to the identical tick count.

use crate::ScalarCodec;
use crate::decimal::Decimal;
use crate::error::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MINUTE: u64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MINUTE;

/// Fractional digits beyond this cannot change the result at any unit.
const MAX_FRACTION_DIGITS: usize = 18;

const MAX_MAGNITUDE: u128 = i64::MAX as u128;

/// A signed elapsed time with nanosecond resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    nanos: i64,
}

impl Duration {
    /// The zero duration (`0s`).
    pub const ZERO: Self = Self { nanos: 0 };

    /// Create a duration from nanoseconds.
    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Create a duration from milliseconds, saturating on overflow.
    pub const fn from_millis(millis: i64) -> Self {
        Self::from_nanos(millis.saturating_mul(NANOS_PER_MILLI as i64))
    }

    /// Create a duration from whole seconds, saturating on overflow.
    pub const fn from_secs(secs: i64) -> Self {
        Self::from_nanos(secs.saturating_mul(NANOS_PER_SECOND as i64))
    }

    /// Create a duration from whole hours, saturating on overflow.
    pub const fn from_hours(hours: i64) -> Self {
        Self::from_nanos(hours.saturating_mul(NANOS_PER_HOUR as i64))
    }

    /// Total nanoseconds.
    pub const fn as_nanos(self) -> i64 {
        self.nanos
    }

    pub const fn is_zero(self) -> bool {
        self.nanos == 0
    }

    pub const fn is_negative(self) -> bool {
        self.nanos < 0
    }

    /// Seconds as a float. Lossy for very large values.
    pub fn as_secs_f64(self) -> f64 {
        self.nanos as f64 / NANOS_PER_SECOND as f64
    }

    /// Exact decimal number of seconds (`1.5s` -> `1.5`).
    pub fn as_seconds_decimal(self) -> Decimal {
        let seconds = rust_decimal::Decimal::from_i128_with_scale(i128::from(self.nanos), 9);
        Decimal::from_inner(seconds.normalize())
    }

    /// Build a duration from a decimal number of seconds.
    ///
    /// Values with sub-nanosecond precision are rounded to the nearest
    /// nanosecond.
    pub fn from_seconds_decimal(seconds: &Decimal) -> Result<Self> {
        let nanos = seconds
            .inner()
            .checked_mul(rust_decimal::Decimal::from(NANOS_PER_SECOND))
            .map(|n| n.round())
            .and_then(|n| n.to_i64())
            .ok_or_else(|| Error::OutOfRange {
                value: seconds.to_string(),
                reason: "does not fit in a duration".to_string(),
            })?;
        Ok(Self::from_nanos(nanos))
    }

    /// Convert to a standard library duration. `None` when negative.
    pub fn to_std(self) -> Option<std::time::Duration> {
        u64::try_from(self.nanos)
            .ok()
            .map(std::time::Duration::from_nanos)
    }

    /// Parse the `<number><unit>` text form.
    pub fn parse(input: &str) -> Result<Self> {
        let (negative, mut rest) = match input.as_bytes().first() {
            Some(b'-') => (true, &input[1..]),
            Some(b'+') => (false, &input[1..]),
            _ => (false, input),
        };

        if rest == "0" {
            return Ok(Self::ZERO);
        }
        if rest.is_empty() {
            return Err(Error::duration(input, "empty duration"));
        }

        // i64::MIN has one more unit of magnitude than i64::MAX.
        let limit = if negative { MAX_MAGNITUDE + 1 } else { MAX_MAGNITUDE };
        let mut total: u128 = 0;
        while !rest.is_empty() {
            let (whole, after_whole) = split_digits(rest);
            let (fraction, after_number) = match after_whole.strip_prefix('.') {
                Some(tail) => split_digits(tail),
                None => ("", after_whole),
            };
            if whole.is_empty() && fraction.is_empty() {
                return Err(Error::duration(
                    input,
                    format!("expected a number at {rest:?}"),
                ));
            }

            let unit_end = after_number
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(after_number.len());
            let (unit, next) = after_number.split_at(unit_end);
            if unit.is_empty() {
                return Err(Error::duration(input, "missing unit"));
            }
            let scale = unit_nanos(unit)
                .ok_or_else(|| Error::duration(input, format!("unknown unit {unit:?}")))?;

            total = component_nanos(whole, fraction, scale, limit)
                .and_then(|amount| total.checked_add(amount))
                .filter(|sum| *sum <= limit)
                .ok_or_else(|| Error::duration(input, "duration overflows"))?;
            rest = next;
        }

        let overflow = || Error::duration(input, "duration overflows");
        let magnitude = i128::try_from(total).map_err(|_| overflow())?;
        let nanos = i64::try_from(if negative { -magnitude } else { magnitude })
            .map_err(|_| overflow())?;
        Ok(Self::from_nanos(nanos))
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

fn component_nanos(whole: &str, fraction: &str, scale: u64, limit: u128) -> Option<u128> {
    let mut value: u128 = 0;
    for digit in whole.bytes() {
        value = value
            .checked_mul(10)?
            .checked_add(u128::from(digit - b'0'))?;
        if value > limit {
            return None;
        }
    }
    let mut nanos = value.checked_mul(u128::from(scale))?;

    if !fraction.is_empty() {
        let digits = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
        let numerator = digits
            .bytes()
            .fold(0u128, |acc, d| acc * 10 + u128::from(d - b'0'));
        let denominator = 10u128.pow(digits.len() as u32);
        nanos = nanos.checked_add(numerator * u128::from(scale) / denominator)?;
    }

    Some(nanos)
}

/// Append `value / unit` with its fractional part, trailing zeros trimmed.
fn push_fraction(out: &mut String, value: u64, unit: u64) {
    out.push_str(&(value / unit).to_string());
    let fraction = value % unit;
    if fraction != 0 {
        let width = unit.ilog10() as usize;
        let digits = format!("{fraction:0width$}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return f.write_str("0s");
        }

        let mut out = String::new();
        if self.nanos < 0 {
            out.push('-');
        }
        let magnitude = self.nanos.unsigned_abs();

        if magnitude < NANOS_PER_MICRO {
            out.push_str(&format!("{magnitude}ns"));
        } else if magnitude < NANOS_PER_MILLI {
            push_fraction(&mut out, magnitude, NANOS_PER_MICRO);
            out.push_str("us");
        } else if magnitude < NANOS_PER_SECOND {
            push_fraction(&mut out, magnitude, NANOS_PER_MILLI);
            out.push_str("ms");
        } else {
            let hours = magnitude / NANOS_PER_HOUR;
            let minutes = (magnitude % NANOS_PER_HOUR) / NANOS_PER_MINUTE;
            if hours > 0 {
                out.push_str(&format!("{hours}h{minutes}m"));
            } else if minutes > 0 {
                out.push_str(&format!("{minutes}m"));
            }
            push_fraction(&mut out, magnitude % NANOS_PER_MINUTE, NANOS_PER_SECOND);
            out.push('s');
        }

        f.write_str(&out)
    }
}

impl FromStr for Duration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl ScalarCodec for Duration {
    const KIND: &'static str = "duration";

    fn parse_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Self::from_nanos(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a duration string such as \"1.5s\" or \"1h30m\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Duration, E> {
                Duration::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(DurationVisitor)
    }
}
