//! Column value and record types
//!
//! Rows travel through the ORM as [`Record`]s: plain maps from column name to
//! [`DatabaseValue`]. Typed entities are decoded from a record field by field
//! through [`RecordExt::field`].

use super::error::{DatabaseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatabaseValue {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit integer
    Integer(i64),
    /// 64-bit floating point
    Float(f64),
    /// Text value
    Text(String),
}

impl DatabaseValue {
    /// Get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(v) => Some(*v),
            DatabaseValue::Integer(v) => Some(*v != 0),
            DatabaseValue::Text(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Get the value as an i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            DatabaseValue::Integer(v) => Some(*v),
            DatabaseValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            DatabaseValue::Text(s) => s.trim().parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get the value as an f64
    pub fn as_double(&self) -> Option<f64> {
        match self {
            DatabaseValue::Float(v) => Some(*v),
            DatabaseValue::Integer(v) => Some(*v as f64),
            DatabaseValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Borrow the value as a string slice (text values only)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render the value as text, the way it is bound for text columns
    pub fn as_string(&self) -> String {
        match self {
            DatabaseValue::Null => String::new(),
            DatabaseValue::Bool(true) => "1".to_string(),
            DatabaseValue::Bool(false) => "0".to_string(),
            DatabaseValue::Integer(v) => v.to_string(),
            DatabaseValue::Float(v) => v.to_string(),
            DatabaseValue::Text(s) => s.clone(),
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "bool",
            DatabaseValue::Integer(_) => "integer",
            DatabaseValue::Float(_) => "float",
            DatabaseValue::Text(_) => "text",
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(v: bool) -> Self {
        DatabaseValue::Bool(v)
    }
}

impl From<i32> for DatabaseValue {
    fn from(v: i32) -> Self {
        DatabaseValue::Integer(v.into())
    }
}

impl From<u32> for DatabaseValue {
    fn from(v: u32) -> Self {
        DatabaseValue::Integer(v.into())
    }
}

impl From<i64> for DatabaseValue {
    fn from(v: i64) -> Self {
        DatabaseValue::Integer(v)
    }
}

impl From<f32> for DatabaseValue {
    fn from(v: f32) -> Self {
        DatabaseValue::Float(v.into())
    }
}

impl From<f64> for DatabaseValue {
    fn from(v: f64) -> Self {
        DatabaseValue::Float(v)
    }
}

impl From<String> for DatabaseValue {
    fn from(v: String) -> Self {
        DatabaseValue::Text(v)
    }
}

impl From<&str> for DatabaseValue {
    fn from(v: &str) -> Self {
        DatabaseValue::Text(v.to_string())
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// A row: column name -> value
pub type Record = HashMap<String, DatabaseValue>;

/// Rows returned from a query
pub type Records = Vec<Record>;

/// Build a [`Record`] payload from column/value pairs
///
/// ```
/// use axion_orm::record;
///
/// let payload = record! { "name" => "Alice", "age" => 30 };
/// assert_eq!(payload.len(), 2);
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $(record.insert(($column).to_string(), $crate::DatabaseValue::from($value));)+
        record
    }};
}

/// Conversion from a column value into a typed entity field
pub trait FromValue: Sized {
    /// Name used in type-mismatch errors
    const EXPECTED: &'static str;

    /// Convert a non-null value
    fn from_value(value: &DatabaseValue) -> Option<Self>;

    /// The field's value for SQL NULL, or `None` when the type disallows null
    fn from_null() -> Option<Self> {
        None
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &DatabaseValue) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &DatabaseValue) -> Option<Self> {
        value.as_int().and_then(|v| i32::try_from(v).ok())
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: &DatabaseValue) -> Option<Self> {
        value.as_double()
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: &DatabaseValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "text";

    fn from_value(value: &DatabaseValue) -> Option<Self> {
        match value {
            DatabaseValue::Null => None,
            other => Some(other.as_string()),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: &DatabaseValue) -> Option<Self> {
        T::from_value(value).map(Some)
    }

    fn from_null() -> Option<Self> {
        Some(None)
    }
}

/// Field access on a [`Record`] for typed decoding
pub trait RecordExt {
    /// Decode `column` into a field type.
    ///
    /// A NULL or absent column is assigned only when the field accepts null
    /// (`Option<T>`); otherwise the field gets `T::default()`. A present value
    /// that does not convert is a [`DatabaseError::TypeMismatch`].
    fn field<T: FromValue + Default>(&self, column: &str) -> Result<T>;
}

impl RecordExt for Record {
    fn field<T: FromValue + Default>(&self, column: &str) -> Result<T> {
        match self.get(column) {
            None | Some(DatabaseValue::Null) => Ok(T::from_null().unwrap_or_default()),
            Some(value) => T::from_value(value)
                .ok_or_else(|| DatabaseError::type_mismatch(column, T::EXPECTED, value.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        let val = DatabaseValue::Integer(42);
        assert_eq!(val.as_int(), Some(42));
        assert_eq!(val.as_double(), Some(42.0));
        assert_eq!(val.as_string(), "42");

        let val = DatabaseValue::Text("123".to_string());
        assert_eq!(val.as_int(), Some(123));

        let val = DatabaseValue::Bool(true);
        assert_eq!(val.as_bool(), Some(true));
        assert_eq!(val.as_int(), Some(1));
        assert_eq!(val.as_string(), "1");
    }

    #[test]
    fn test_value_from_types() {
        let val: DatabaseValue = 42.into();
        assert_eq!(val, DatabaseValue::Integer(42));

        let val: DatabaseValue = "hello".into();
        assert_eq!(val, DatabaseValue::Text("hello".to_string()));

        let val: DatabaseValue = Some(1.5).into();
        assert_eq!(val, DatabaseValue::Float(1.5));

        let val: DatabaseValue = Option::<i32>::None.into();
        assert_eq!(val, DatabaseValue::Null);
    }

    #[test]
    fn test_record_macro() {
        let payload = record! { "name" => "x", "age" => 7, "bio" => Option::<String>::None };
        assert_eq!(payload.get("name"), Some(&DatabaseValue::Text("x".into())));
        assert_eq!(payload.get("age"), Some(&DatabaseValue::Integer(7)));
        assert_eq!(payload.get("bio"), Some(&DatabaseValue::Null));
    }

    #[test]
    fn test_field_nullable_or_present() {
        let row = record! { "id" => 3, "nickname" => Option::<String>::None, "age" => "41" };

        assert_eq!(row.field::<i64>("id").unwrap(), 3);
        assert_eq!(row.field::<Option<String>>("nickname").unwrap(), None);
        assert_eq!(row.field::<String>("nickname").unwrap(), "");
        assert_eq!(row.field::<i32>("age").unwrap(), 41);
        assert_eq!(row.field::<Option<i64>>("missing").unwrap(), None);
        assert_eq!(row.field::<i64>("missing").unwrap(), 0);
    }

    #[test]
    fn test_field_type_mismatch() {
        let row = record! { "age" => "forty" };
        let err = row.field::<i64>("age").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch on `age`: expected integer, got text"
        );
    }

    #[test]
    fn test_value_serializes_untagged() {
        let row = record! { "n" => 1 };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!({ "n": 1 }));
    }
}
