//! Scalar values moved between the legacy store and the destination.
//!
//! Legacy SQLite rows only ever yield integers, reals, text, blobs and NULL.
//! Destination rows are narrowed by the entity builder to the field's kind
//! (`I32` for integer fields, `Decimal` for decimal fields, `Text` for text).

use std::fmt;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// Type hint for NULL values so writers can bind a correctly typed NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    /// NULL read from the legacy store; no declared type is trusted there.
    Untyped,
    I32,
    I64,
    F64,
    String,
    Bytes,
    Decimal,
}

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL with type hint for correct parameter binding.
    Null(SqlNullType),

    /// 32-bit signed integer (integer fields).
    I32(i32),

    /// 64-bit signed integer (SQLite INTEGER storage class).
    I64(i64),

    /// Double precision float (SQLite REAL storage class).
    F64(f64),

    /// Text data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Fixed-point decimal (decimal fields).
    Decimal(Decimal),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Get the SqlNullType for this value (for type-aware NULL binding).
    #[must_use]
    pub fn null_type(&self) -> SqlNullType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::I32(_) => SqlNullType::I32,
            SqlValue::I64(_) => SqlNullType::I64,
            SqlValue::F64(_) => SqlNullType::F64,
            SqlValue::Text(_) => SqlNullType::String,
            SqlValue::Bytes(_) => SqlNullType::Bytes,
            SqlValue::Decimal(_) => SqlNullType::Decimal,
        }
    }

    /// Short type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null(_) => "null",
            SqlValue::I32(_) | SqlValue::I64(_) => "integer",
            SqlValue::F64(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "blob",
            SqlValue::Decimal(_) => "decimal",
        }
    }

    /// Text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null(_) => f.write_str("NULL"),
            SqlValue::I32(v) => write!(f, "{}", v),
            SqlValue::I64(v) => write!(f, "{}", v),
            SqlValue::F64(v) => write!(f, "{}", v),
            SqlValue::Text(v) => f.write_str(v),
            SqlValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            SqlValue::Decimal(v) => write!(f, "{}", v),
        }
    }
}

// JSON form used by `--output-json` and in-memory store dumps.
impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null(_) => serializer.serialize_none(),
            SqlValue::I32(v) => serializer.serialize_i32(*v),
            SqlValue::I64(v) => serializer.serialize_i64(*v),
            SqlValue::F64(v) => serializer.serialize_f64(*v),
            SqlValue::Text(v) => serializer.serialize_str(v),
            SqlValue::Bytes(v) => serializer.serialize_bytes(v),
            SqlValue::Decimal(v) => serializer.serialize_str(&v.to_string()),
        }
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into)
            .unwrap_or(SqlValue::Null(SqlNullType::Untyped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_is_null() {
        assert!(SqlValue::Null(SqlNullType::Untyped).is_null());
        assert!(!SqlValue::I64(42).is_null());
    }

    #[test]
    fn test_null_type_follows_variant() {
        assert_eq!(SqlValue::I32(1).null_type(), SqlNullType::I32);
        assert_eq!(SqlValue::from("x").null_type(), SqlNullType::String);
        assert_eq!(
            SqlValue::Null(SqlNullType::Decimal).null_type(),
            SqlNullType::Decimal
        );
    }

    #[test]
    fn test_from_option() {
        let none: Option<i64> = None;
        assert_eq!(SqlValue::from(none), SqlValue::Null(SqlNullType::Untyped));
        assert_eq!(SqlValue::from(Some(7i64)), SqlValue::I64(7));
    }

    #[test]
    fn test_serialize_json() {
        let values = vec![
            SqlValue::I32(5),
            SqlValue::Text("Acme".into()),
            SqlValue::Null(SqlNullType::String),
            SqlValue::Decimal(Decimal::new(750, 2)),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[5,"Acme",null,"7.50"]"#);
    }
}
