//! Conversion of bound [`SqlValue`]s into SQLite storage values.
//!
//! SQLite has no native date, boolean or array types: timestamps are stored
//! as RFC 3339 text, dates as `YYYY-MM-DD`, booleans as 0/1 and text arrays
//! as comma-joined text.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use strata_core::value::SqlValue;

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn encode_date(date: NaiveDate) -> String { date.format("%Y-%m-%d").to_string() }

pub fn encode_value(value: SqlValue) -> Value {
  match value {
    SqlValue::Null => Value::Null,
    SqlValue::Integer(i) => Value::Integer(i),
    SqlValue::Float(f) => Value::Real(f),
    SqlValue::Boolean(b) => Value::Integer(i64::from(b)),
    SqlValue::Text(s) => Value::Text(s),
    SqlValue::Timestamp(ts) => Value::Text(encode_dt(ts)),
    SqlValue::Date(d) => Value::Text(encode_date(d)),
    SqlValue::TextArray(items) => Value::Text(items.join(",")),
  }
}
