//! Backend-agnostic value and row types.
//!
//! The [`Value`] enum carries statement parameters into a backend and result
//! columns back out of it. [`Row`] pairs column names with values and offers
//! typed access through [`FromValue`], so callers decode into concrete types at
//! the boundary instead of passing untyped data upward.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use graph_migrate_core::MigrateError;

/// A backend-agnostic representation of a graph value.
///
/// # Examples
///
/// ```
/// use graph_migrate_backends::value::Value;
///
/// let v = Value::from(42_i64);
/// assert_eq!(v, Value::Int(42));
///
/// let v = Value::from("hello");
/// assert_eq!(v, Value::String("hello".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// A point in time, UTC.
    DateTime(DateTime<Utc>),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A map of string keys to values.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Converts a JSON value returned by a backend into a [`Value`].
    ///
    /// Integral JSON numbers become [`Value::Int`]; other numbers become
    /// [`Value::Float`]. Strings stay strings; typed decoding (e.g. into
    /// timestamps) happens in [`FromValue`].
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect())
            }
        }
    }

    /// Converts this value into JSON for transmission as a statement parameter.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::json!(i),
            Self::Float(f) => serde_json::json!(f),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Returns `true` if this is [`Value::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::List(_) | Self::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Trait for converting a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> Result<Self, MigrateError>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, MigrateError> {
        Ok(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, MigrateError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(MigrateError::Decode(format!("Expected String, got {value:?}"))),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, MigrateError> {
        match value {
            Value::Int(i) => Ok(*i),
            _ => Err(MigrateError::Decode(format!("Expected Int, got {value:?}"))),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, MigrateError> {
        match value {
            Value::Bool(b) => Ok(*b),
            _ => Err(MigrateError::Decode(format!("Expected Bool, got {value:?}"))),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, MigrateError> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::String(s) => parse_timestamp(s),
            _ => Err(MigrateError::Decode(format!("Expected DateTime, got {value:?}"))),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, MigrateError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Parses a timestamp as rendered by graph databases.
///
/// Accepts RFC 3339 with any fractional precision and tolerates a trailing
/// zone-id suffix such as `[UTC]`.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, MigrateError> {
    let trimmed = raw.split('[').next().unwrap_or(raw).trim();
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MigrateError::Decode(format!("Invalid timestamp '{raw}': {e}")))
}

/// A single result row: column names paired with values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// Returns [`MigrateError::Decode`] if the lengths differ.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Result<Self, MigrateError> {
        if columns.len() != values.len() {
            return Err(MigrateError::Decode(format!(
                "Row has {} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, MigrateError> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| MigrateError::Decode(format!("Column '{column}' not found in row")))?;
        T::from_value(&self.values[idx])
            .map_err(|e| MigrateError::Decode(format!("Column '{column}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(Value::from_json(serde_json::json!(7)), Value::Int(7));
        assert_eq!(Value::from_json(serde_json::json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn test_from_json_nested() {
        let v = Value::from_json(serde_json::json!({"a": [1, null, "x"]}));
        let Value::Map(map) = v else {
            panic!("expected map");
        };
        assert_eq!(
            map["a"],
            Value::List(vec![Value::Int(1), Value::Null, Value::String("x".into())])
        );
    }

    #[test]
    fn test_to_json_datetime_is_rfc3339() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(Value::from(dt).to_json(), serde_json::json!("2024-03-01T12:00:00+00:00"));
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::String("a".into()));
    }

    #[test]
    fn test_datetime_from_neo4j_string() {
        let v = Value::String("2024-05-01T10:00:00.123456789Z".into());
        let dt = DateTime::<Utc>::from_value(&v).unwrap();
        assert_eq!(dt.timestamp(), Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap().timestamp());
    }

    #[test]
    fn test_datetime_with_zone_suffix() {
        let v = Value::String("2024-05-01T10:00:00Z[UTC]".into());
        assert!(DateTime::<Utc>::from_value(&v).is_ok());
    }

    #[test]
    fn test_datetime_invalid() {
        let v = Value::String("yesterday".into());
        assert!(matches!(DateTime::<Utc>::from_value(&v), Err(MigrateError::Decode(_))));
    }

    #[test]
    fn test_row_get_typed() {
        let row = Row::from_pairs([("identity", Value::from("core/001")), ("count", Value::Int(2))]);
        assert_eq!(row.get::<String>("identity").unwrap(), "core/001");
        assert_eq!(row.get::<i64>("count").unwrap(), 2);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_row_get_missing_column() {
        let row = Row::from_pairs([("identity", "core/001")]);
        assert!(matches!(row.get::<String>("checksum"), Err(MigrateError::Decode(_))));
    }

    #[test]
    fn test_row_get_wrong_type() {
        let row = Row::from_pairs([("count", "two")]);
        let err = row.get::<i64>("count").unwrap_err();
        assert!(err.to_string().contains("count"));
    }

    #[test]
    fn test_row_get_optional_null() {
        let row = Row::from_pairs([("checksum", Value::Null)]);
        assert_eq!(row.get::<Option<String>>("checksum").unwrap(), None);
    }

    #[test]
    fn test_row_new_length_mismatch() {
        let result = Row::new(vec!["a".into()], vec![]);
        assert!(result.is_err());
    }
}
