//! Cell values and the post-processing applied to them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReportError, Result};

/// A numeric cell value.
///
/// Values are kept normalized: a double without a fractional part is stored as
/// a `Long`. That keeps a freshly computed value identical to the same value
/// read back from a cache, where integers are recognized by the absence of a
/// fractional part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// An integer value (counts, truncated sums).
    Long(i64),
    /// A decimal value (averages, ratios).
    Double(f64),
}

impl Value {
    /// The value of an empty bucket.
    pub const ZERO: Value = Value::Long(0);

    /// Builds a normalized value from a float.
    pub fn from_f64(v: f64) -> Self {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            Value::Long(v as i64)
        } else {
            Value::Double(v)
        }
    }

    /// Collapses a whole-numbered `Double` into a `Long`.
    pub fn normalized(self) -> Self {
        match self {
            Value::Double(v) => Value::from_f64(v),
            long => long,
        }
    }

    /// Returns the value as f64.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Long(v) => *v as f64,
            Value::Double(v) => *v,
        }
    }

    /// Returns the value as i64 when it has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            Value::Double(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Double(_) => None,
        }
    }

    /// Returns true if the value is zero.
    pub fn is_zero(&self) -> bool {
        self.as_f64() == 0.0
    }

    /// Adds two values, staying integral when both are.
    pub fn add(self, other: Value) -> Value {
        match (self, other) {
            (Value::Long(a), Value::Long(b)) => a
                .checked_add(b)
                .map(Value::Long)
                .unwrap_or_else(|| Value::Double(a as f64 + b as f64)),
            (a, b) => Value::from_f64(a.as_f64() + b.as_f64()),
        }
    }

    /// Multiplies two values, staying integral when both are.
    pub fn multiply(self, other: Value) -> Value {
        match (self, other) {
            (Value::Long(a), Value::Long(b)) => a
                .checked_mul(b)
                .map(Value::Long)
                .unwrap_or_else(|| Value::Double(a as f64 * b as f64)),
            (a, b) => Value::from_f64(a.as_f64() * b.as_f64()),
        }
    }

    /// Divides two values; a zero denominator yields zero.
    pub fn safe_divide(self, denominator: Value) -> Value {
        if denominator.is_zero() {
            return Value::ZERO;
        }
        Value::from_f64(self.as_f64() / denominator.as_f64())
    }

    /// Encodes the value for a cache store.
    pub fn to_cache_string(&self) -> String {
        self.to_string()
    }

    /// Decodes a value written by [`Value::to_cache_string`].
    ///
    /// Integers are recognized by the absence of a fractional part.
    pub fn from_cache_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<i64>() {
            return Ok(Value::Long(v));
        }
        raw.parse::<f64>()
            .map(Value::from_f64)
            .map_err(|_| ReportError::TypeMismatch {
                expected: "integer or decimal".to_string(),
                found: raw.to_string(),
            })
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::ZERO
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::from_f64(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Long(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
        }
    }
}

/// Per-value transform applied before any user map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Leave the value as computed.
    #[default]
    None,
    /// Truncate toward zero to an integer.
    Truncate,
    /// Round to the configured precision.
    Round,
    /// Round to a fixed number of decimals.
    RoundTo(u32),
}

impl Transform {
    /// Applies the transform. `precision` is used by [`Transform::Round`].
    pub fn apply(&self, value: Value, precision: u32) -> Value {
        match (self, value) {
            (Transform::None, v) | (_, v @ Value::Long(_)) => v,
            (Transform::Truncate, Value::Double(v)) => Value::from_f64(v.trunc()),
            (Transform::Round, Value::Double(v)) => Value::from_f64(round_to(v, precision)),
            (Transform::RoundTo(p), Value::Double(v)) => Value::from_f64(round_to(v, *p)),
        }
    }
}

/// Rounds half away from zero to `precision` decimals.
pub fn round_to(v: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (v * factor).round() / factor
}
