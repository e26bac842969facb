//! Runtime values and the coercion table.
//!
//! `Value` is what flows through every seam: carrier members, bound
//! parameters, row columns and insert scalars. `FromValue` is the explicit
//! conversion table from a value's runtime kind to a declared Rust type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::error::{RepositoryError, Result};

pub use serde_json::Value as JsonValue;

/// A database value as seen by the repository.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Structured value, stored as JSON text by drivers without a native type
    Json(JsonValue),
}

impl Value {
    /// Check if this value is the database null marker.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the runtime kind, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOL",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Json(_) => "JSON",
        }
    }

    /// Convert a JSON member into a value. Scalars map to their natural kind,
    /// arrays and objects stay structured.
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            JsonValue::String(s) => Value::Text(s.clone()),
            other => Value::Json(other.clone()),
        }
    }
}

fn mismatch(value: &Value, target: &str) -> RepositoryError {
    RepositoryError::MappingError(format!("cannot convert {} to {}", value.kind(), target))
}

// ============================================================================
// Conversions into Value
// ============================================================================

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Value::Json(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Text(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Text(v.format("%Y-%m-%d").to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Text(v.to_rfc3339())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// Conversions out of Value
// ============================================================================

/// Coerce a value into a declared Rust type.
///
/// Non-optional targets reject `Value::Null`; `Option<T>` maps it to `None`.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| RepositoryError::MappingError(format!("'{}' is not an integer", s))),
            other => Err(mismatch(other, "i64")),
        }
    }
}

macro_rules! from_value_narrow_int {
    ($($t:ty),*) => {
        $(impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self> {
                let wide = i64::from_value(value)?;
                <$t>::try_from(wide).map_err(|_| {
                    RepositoryError::MappingError(format!(
                        "{} is out of range for {}",
                        wide,
                        stringify!($t)
                    ))
                })
            }
        })*
    };
}

from_value_narrow_int!(i8, i16, i32, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| RepositoryError::MappingError(format!("'{}' is not a number", s))),
            other => Err(mismatch(other, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(RepositoryError::MappingError(format!("'{}' is not a boolean", s))),
            },
            other => Err(mismatch(other, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Json(json) => Ok(json.to_string()),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|_| RepositoryError::MappingError("BLOB is not valid UTF-8".to_string())),
            Value::Null => Err(mismatch(value, "String")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(mismatch(other, "Vec<u8>")),
        }
    }
}

impl FromValue for JsonValue {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(json) => Ok(json.clone()),
            Value::Text(s) => serde_json::from_str(s)
                .map_err(|e| RepositoryError::MappingError(format!("invalid JSON: {}", e))),
            Value::Int(i) => Ok(JsonValue::from(*i)),
            Value::Float(f) => Ok(JsonValue::from(*f)),
            Value::Bool(b) => Ok(JsonValue::Bool(*b)),
            other => Err(mismatch(other, "JSON")),
        }
    }
}

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .ok_or_else(|| {
                    RepositoryError::MappingError(format!("'{}' is not a timestamp", s))
                }),
            Value::Int(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| {
                    RepositoryError::MappingError(format!("{} is out of range for a timestamp", secs))
                }),
            other => Err(mismatch(other, "NaiveDateTime")),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| NaiveDateTime::from_value(value).ok().map(|dt| dt.date()))
                .ok_or_else(|| RepositoryError::MappingError(format!("'{}' is not a date", s))),
            other => Err(mismatch(other, "NaiveDate")),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => Ok(dt.with_timezone(&Utc)),
                Err(_) => NaiveDateTime::from_value(value).map(|naive| Utc.from_utc_datetime(&naive)),
            },
            Value::Int(_) => NaiveDateTime::from_value(value).map(|naive| Utc.from_utc_datetime(&naive)),
            other => Err(mismatch(other, "DateTime<Utc>")),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Uuid::parse_str(s)
                .map_err(|_| RepositoryError::MappingError(format!("'{}' is not a UUID", s))),
            Value::Bytes(b) => Uuid::from_slice(b)
                .map_err(|_| RepositoryError::MappingError("BLOB is not a 16-byte UUID".to_string())),
            other => Err(mismatch(other, "Uuid")),
        }
    }
}
