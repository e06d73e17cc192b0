//! SQL dialect differences: identifier limits, type names, quoting and the
//! features the DDL generator and linker have to work around.

use serde::Deserialize;

use crate::{model::SqlType, value::SqlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
  #[default]
  Postgres,
  Redshift,
  Sqlite,
}

impl Dialect {
  pub fn max_identifier_len(self) -> usize {
    match self {
      Dialect::Postgres | Dialect::Sqlite => 63,
      Dialect::Redshift => 127,
    }
  }

  pub fn column_type(self, sql_type: SqlType) -> &'static str {
    match (self, sql_type) {
      (Dialect::Sqlite, SqlType::Integer | SqlType::Boolean) => "INTEGER",
      (Dialect::Sqlite, SqlType::Float) => "REAL",
      (Dialect::Sqlite, _) => "TEXT",

      (Dialect::Redshift, SqlType::Text | SqlType::TextArray) => "varchar(65535)",
      (Dialect::Postgres, SqlType::Text) => "text",
      (Dialect::Postgres, SqlType::TextArray) => "text[]",
      (_, SqlType::Integer) => "bigint",
      (_, SqlType::Float) => "float",
      (_, SqlType::Boolean) => "bool",
      (_, SqlType::Timestamp) => "timestamptz",
      (_, SqlType::Date) => "date",
    }
  }

  /// Type of link and back-reference columns.
  pub fn link_type(self) -> &'static str {
    match self {
      Dialect::Sqlite => "INTEGER",
      _ => "integer",
    }
  }

  /// Full definition of the auto-incrementing identity column.
  pub fn identity_definition(self) -> &'static str {
    match self {
      Dialect::Postgres => "serial primary key",
      Dialect::Redshift => "int identity(1, 1) not null primary key",
      Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
    }
  }

  pub fn supports_arrays(self) -> bool { self == Dialect::Postgres }

  pub fn supports_namespaces(self) -> bool { self != Dialect::Sqlite }

  pub fn supports_comments(self) -> bool { self != Dialect::Sqlite }

  /// Whether foreign keys can be added to an existing table.
  pub fn supports_add_constraint(self) -> bool { self != Dialect::Sqlite }

  pub fn supports_drop_constraint_if_exists(self) -> bool { self == Dialect::Postgres }

  pub fn quote(self, ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

  /// Quoted, namespace-qualified table name.
  pub fn table_name(self, namespace: Option<&str>, table: &str) -> String {
    match namespace.filter(|_| self.supports_namespaces()) {
      Some(ns) => format!("{}.{}", self.quote(ns), self.quote(table)),
      None => self.quote(table),
    }
  }

  /// Positional bind parameter, 1-based.
  pub fn placeholder(self, n: usize) -> String {
    match self {
      Dialect::Sqlite => format!("?{n}"),
      _ => format!("${n}"),
    }
  }

  /// Adapt a converted value to what this dialect can store.
  pub fn adapt(self, value: SqlValue) -> SqlValue {
    match value {
      SqlValue::TextArray(items) if !self.supports_arrays() => SqlValue::Text(items.join(",")),
      other => other,
    }
  }
}

/// Render `s` as a single-quoted SQL string literal.
pub fn string_literal(s: &str) -> String { format!("'{}'", s.replace('\'', "''")) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn arrays_degrade_without_native_support() {
    let tags = SqlValue::TextArray(vec!["a".to_owned(), "b".to_owned()]);
    assert_eq!(Dialect::Sqlite.adapt(tags.clone()), SqlValue::Text("a,b".to_owned()));
    assert_eq!(Dialect::Redshift.column_type(SqlType::TextArray), "varchar(65535)");
    assert_eq!(Dialect::Postgres.adapt(tags.clone()), tags);
  }

  #[test]
  fn namespace_is_dropped_on_sqlite() {
    assert_eq!(Dialect::Postgres.table_name(Some("loans"), "root"), "\"loans\".\"root\"");
    assert_eq!(Dialect::Sqlite.table_name(Some("loans"), "root"), "\"root\"");
  }

  #[test]
  fn quoting() {
    assert_eq!(Dialect::Postgres.quote("we\"ird"), "\"we\"\"ird\"");
    assert_eq!(string_literal("it's"), "'it''s'");
    assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
    assert_eq!(Dialect::Redshift.placeholder(3), "$3");
  }
}
