//! SQLite value encoding and decoding.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

use crate::value::Value;

impl Value {
    /// Convert from rusqlite ValueRef.
    pub fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            // TEXT that is not valid UTF-8 is kept byte for byte
            ValueRef::Text(s) => match std::str::from_utf8(s) {
                Ok(text) => Value::Text(text.to_string()),
                Err(_) => Value::Bytes(s.to_vec()),
            },
            ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Null => Ok(ToSqlOutput::Owned(SqlValue::Null)),
            Value::Bool(b) => Ok(ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b)))),
            Value::Int(i) => Ok(ToSqlOutput::Owned(SqlValue::Integer(*i))),
            Value::Float(f) => Ok(ToSqlOutput::Owned(SqlValue::Real(*f))),
            // Borrow text and blobs instead of cloning them into the statement
            Value::Text(s) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes()))),
            Value::Bytes(b) => Ok(ToSqlOutput::Borrowed(ValueRef::Blob(b))),
            Value::Json(json) => Ok(ToSqlOutput::Owned(SqlValue::Text(json.to_string()))),
        }
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(Value::from_value_ref(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_every_storage_class() {
        assert_eq!(Value::from_value_ref(ValueRef::Null), Value::Null);
        assert_eq!(Value::from_value_ref(ValueRef::Integer(42)), Value::Int(42));
        assert_eq!(Value::from_value_ref(ValueRef::Real(1.5)), Value::Float(1.5));
        assert_eq!(
            Value::from_value_ref(ValueRef::Text(b"hello")),
            Value::Text("hello".to_string())
        );
        assert_eq!(
            Value::from_value_ref(ValueRef::Blob(&[1, 2, 3])),
            Value::Bytes(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_invalid_utf8_text_decodes_as_bytes() {
        assert_eq!(
            Value::from_value_ref(ValueRef::Text(&[0x66, 0xff, 0x6f])),
            Value::Bytes(vec![0x66, 0xff, 0x6f])
        );
    }

    #[test]
    fn test_bool_encodes_as_integer() {
        let value = Value::Bool(true);
        let out = value.to_sql().unwrap();
        assert!(matches!(out, ToSqlOutput::Owned(SqlValue::Integer(1))));
    }

    #[test]
    fn test_json_encodes_as_text() {
        let value = Value::Json(serde_json::json!({"a": 1}));
        let out = value.to_sql().unwrap();
        match out {
            ToSqlOutput::Owned(SqlValue::Text(s)) => assert_eq!(s, r#"{"a":1}"#),
            other => panic!("unexpected encoding: {:?}", other),
        }
    }
}
