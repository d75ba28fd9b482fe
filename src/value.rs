//! Variant values carried by samples and event fields.
//!
//! A `Variant` is a tagged union of the scalar and array types a monitored
//! entity can produce.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Possible values of a sample or event field.
///
/// # Examples
///
/// ```
/// use historian::Variant;
///
/// let level = Variant::Float(42.5);
/// let name = Variant::from("MyLevel");
///
/// assert!(level.is_float());
/// assert_eq!(name.as_string(), Some("MyLevel"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    ByteString(Vec<u8>),
    BoolArray(Vec<bool>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StringArray(Vec<String>),
}

impl Variant {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub const fn is_array(&self) -> bool {
        matches!(
            self,
            Self::BoolArray(_) | Self::IntArray(_) | Self::FloatArray(_) | Self::StringArray(_)
        )
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to float.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::ByteString(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::ByteString(_) => "bytestring",
            Self::BoolArray(_) => "bool[]",
            Self::IntArray(_) => "int[]",
            Self::FloatArray(_) => "float[]",
            Self::StringArray(_) => "string[]",
        }
    }

    /// Ordering used by event filter comparisons.
    ///
    /// Numbers compare numerically across `Int`/`Float`, strings and bools
    /// compare within their own type. Everything else is unordered.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// Equality used by event filters (numeric types compare by value).
    #[must_use]
    pub fn loosely_equals(&self, other: &Self) -> bool {
        match self.compare(other) {
            Some(ord) => ord == Ordering::Equal,
            None => self == other,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::ByteString(v) => write!(f, "0x{}", hex::encode(v)),
            Self::BoolArray(v) => write!(f, "bool[{}]", v.len()),
            Self::IntArray(v) => write!(f, "int[{}]", v.len()),
            Self::FloatArray(v) => write!(f, "float[{}]", v.len()),
            Self::StringArray(v) => write!(f, "string[{}]", v.len()),
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u16> for Variant {
    fn from(v: u16) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for Variant {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl From<Vec<u8>> for Variant {
    fn from(v: Vec<u8>) -> Self {
        Self::ByteString(v)
    }
}

impl From<Vec<f64>> for Variant {
    fn from(v: Vec<f64>) -> Self {
        Self::FloatArray(v)
    }
}

impl From<Vec<i64>> for Variant {
    fn from(v: Vec<i64>) -> Self {
        Self::IntArray(v)
    }
}

impl From<Vec<bool>> for Variant {
    fn from(v: Vec<bool>) -> Self {
        Self::BoolArray(v)
    }
}

impl From<Vec<String>> for Variant {
    fn from(v: Vec<String>) -> Self {
        Self::StringArray(v)
    }
}
