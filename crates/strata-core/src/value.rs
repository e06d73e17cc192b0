//! Typed column values and the JSON → SQL conversions the flattener applies.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::{
  Error, Result,
  config::ItemIdType,
  model::SqlType,
  schema::{Format, Primitive, Scalar},
};

/// A value bound into an insert statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
  Null,
  Integer(i64),
  Float(f64),
  Boolean(bool),
  Text(String),
  Timestamp(DateTime<Utc>),
  Date(NaiveDate),
  TextArray(Vec<String>),
}

impl SqlValue {
  pub fn is_null(&self) -> bool { matches!(self, SqlValue::Null) }

  fn into_text(self) -> SqlValue {
    match self {
      SqlValue::Integer(i) => SqlValue::Text(i.to_string()),
      SqlValue::Float(f) => SqlValue::Text(f.to_string()),
      SqlValue::Boolean(b) => SqlValue::Text(b.to_string()),
      SqlValue::Timestamp(ts) => SqlValue::Text(ts.to_rfc3339()),
      SqlValue::Date(d) => SqlValue::Text(d.to_string()),
      SqlValue::TextArray(items) => SqlValue::Text(items.join(",")),
      other => other,
    }
  }
}

// ─── Item ids ────────────────────────────────────────────────────────────────

/// The caller-supplied identifier of one document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemId {
  Integer(i64),
  Text(String),
}

impl ItemId {
  pub fn to_value(&self) -> SqlValue {
    match self {
      ItemId::Integer(i) => SqlValue::Integer(*i),
      ItemId::Text(s) => SqlValue::Text(s.clone()),
    }
  }

  /// Fails unless the id matches the configured column type.
  pub fn check(&self, expected: ItemIdType) -> Result<()> {
    match (self, expected) {
      (ItemId::Integer(_), ItemIdType::Integer) | (ItemId::Text(_), ItemIdType::String) => Ok(()),
      _ => Err(Error::InvalidItemId {
        expected: format!("{expected:?}").to_lowercase(),
        found:    self.to_string(),
      }),
    }
  }
}

impl fmt::Display for ItemId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ItemId::Integer(i) => write!(f, "{i}"),
      ItemId::Text(s) => write!(f, "{s:?}"),
    }
  }
}

impl From<i64> for ItemId {
  fn from(id: i64) -> Self { ItemId::Integer(id) }
}

impl From<&str> for ItemId {
  fn from(id: &str) -> Self { ItemId::Text(id.to_owned()) }
}

impl From<String> for ItemId {
  fn from(id: String) -> Self { ItemId::Text(id) }
}

// ─── Conversion ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
  #[error("expected {expected}, found {found}")]
  Mismatch { expected: &'static str, found: String },
  #[error("{0} is not one of the allowed values")]
  NotInEnum(Value),
  #[error("unparseable {kind}: {value:?}")]
  Unparseable { kind: &'static str, value: String },
}

fn mismatch(expected: &'static str, found: &Value) -> ConversionError {
  let found = match found {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  };
  ConversionError::Mismatch { expected, found: found.to_owned() }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
    return Some(ts.with_timezone(&Utc));
  }
  ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .map(|naive| naive.and_utc())
}

fn convert_primitive(value: &Value, scalar: &Scalar) -> Result<SqlValue, ConversionError> {
  match (scalar.primitive, scalar.format) {
    (Primitive::String, Some(Format::DateTime)) => {
      let s = value.as_str().ok_or_else(|| mismatch("timestamp string", value))?;
      parse_timestamp(s).map(SqlValue::Timestamp).ok_or_else(|| ConversionError::Unparseable {
        kind:  "timestamp",
        value: s.to_owned(),
      })
    }
    (Primitive::String, Some(Format::Date)) => {
      let s = value.as_str().ok_or_else(|| mismatch("date string", value))?;
      NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(SqlValue::Date)
        .map_err(|_| ConversionError::Unparseable { kind: "date", value: s.to_owned() })
    }
    (Primitive::String, None) => match value {
      Value::String(s) => Ok(SqlValue::Text(s.clone())),
      Value::Number(n) => Ok(SqlValue::Text(n.to_string())),
      other => Err(mismatch("string", other)),
    },
    (Primitive::Integer, _) => {
      let Value::Number(n) = value else {
        return Err(mismatch("integer", value));
      };
      if let Some(i) = n.as_i64() {
        return Ok(SqlValue::Integer(i));
      }
      match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
          Ok(SqlValue::Integer(f as i64))
        }
        _ => Err(ConversionError::Unparseable { kind: "integer", value: n.to_string() }),
      }
    }
    (Primitive::Number, _) => value
      .as_f64()
      .map(SqlValue::Float)
      .ok_or_else(|| mismatch("number", value)),
    (Primitive::Boolean, _) => value
      .as_bool()
      .map(SqlValue::Boolean)
      .ok_or_else(|| mismatch("boolean", value)),
  }
}

/// Convert one JSON value according to a scalar description.
pub fn convert(value: &Value, scalar: &Scalar) -> Result<SqlValue, ConversionError> {
  if scalar.array {
    let Value::Array(elements) = value else {
      return Err(mismatch("array", value));
    };
    let element = Scalar { array: false, ..scalar.clone() };
    let mut items = Vec::with_capacity(elements.len());
    for v in elements {
      if v.is_null() {
        continue;
      }
      match convert(v, &element)?.into_text() {
        SqlValue::Text(s) => items.push(s),
        _ => return Err(mismatch("scalar array element", v)),
      }
    }
    return Ok(SqlValue::TextArray(items));
  }

  if let Some(allowed) = &scalar.enumeration {
    if !allowed.contains(value) {
      return Err(ConversionError::NotInEnum(value.clone()));
    }
    return Ok(match value {
      Value::String(s) => SqlValue::Text(s.clone()),
      other => SqlValue::Text(other.to_string()),
    });
  }

  convert_primitive(value, scalar)
}

/// Convert a value into a column that may accept several variants, widening
/// the result to the column type.
pub fn convert_column(
  value: &Value,
  variants: &[Scalar],
  sql_type: SqlType,
) -> Result<SqlValue, ConversionError> {
  let mut last = mismatch("a declared variant", value);
  for variant in variants {
    match convert(value, variant) {
      Ok(converted) => return Ok(widen(converted, sql_type)),
      Err(e) => last = e,
    }
  }
  Err(last)
}

fn widen(value: SqlValue, sql_type: SqlType) -> SqlValue {
  match (value, sql_type) {
    (SqlValue::Integer(i), SqlType::Float) => SqlValue::Float(i as f64),
    (v @ SqlValue::Text(_), SqlType::Text) => v,
    (v, SqlType::Text) => v.into_text(),
    (v, _) => v,
  }
}

/// Escape a document key for use as a JSON-Pointer segment.
pub fn escape_pointer(segment: &str) -> String { segment.replace('~', "~0").replace('/', "~1") }
