//! DDL rendering for a [`TableModel`].
//!
//! Foreign keys are not emitted here; the linker adds them once link columns
//! are populated.

use crate::{
  dialect::{Dialect, string_literal},
  model::{ColumnRole, ColumnSpec, TableModel, TableSpec},
};

/// How existing tables are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
  /// Plain `CREATE TABLE`; fails if a table exists.
  #[default]
  Create,
  CreateIfAbsent,
  /// Drop existing tables (or the whole namespace) first.
  Recreate,
}

fn column_definition(dialect: Dialect, column: &ColumnSpec) -> String {
  let name = dialect.quote(&column.name);
  match column.role {
    ColumnRole::Identity => format!("{name} {}", dialect.identity_definition()),
    ColumnRole::Link => format!("{name} {}", dialect.link_type()),
    _ if !column.nullable => format!("{name} {} not null", dialect.column_type(column.sql_type)),
    _ => format!("{name} {}", dialect.column_type(column.sql_type)),
  }
}

fn create_table(
  model: &TableModel,
  table: &TableSpec,
  dialect: Dialect,
  namespace: Option<&str>,
  if_absent: bool,
) -> String {
  let mut lines: Vec<String> = table.columns.iter().map(|c| column_definition(dialect, c)).collect();
  lines.push(format!(
    "unique ({}, {})",
    dialect.quote(model.item_column()),
    dialect.quote(model.prefix_column())
  ));
  format!(
    "create table {}{} (\n  {}\n)",
    if if_absent { "if not exists " } else { "" },
    dialect.table_name(namespace, &table.name),
    lines.join(",\n  ")
  )
}

fn comments(table: &TableSpec, dialect: Dialect, namespace: Option<&str>) -> Vec<String> {
  let name = dialect.table_name(namespace, &table.name);
  let mut out = Vec::new();
  if let Some(comment) = &table.comment {
    out.push(format!("comment on table {name} is {}", string_literal(comment)));
  }
  for column in &table.columns {
    if let Some(comment) = &column.comment {
      out.push(format!(
        "comment on column {name}.{} is {}",
        dialect.quote(&column.name),
        string_literal(comment)
      ));
    }
  }
  out
}

/// Render the statements creating every table of `model`, in order.
pub fn generate(
  model: &TableModel,
  dialect: Dialect,
  namespace: Option<&str>,
  mode: CreateMode,
) -> Vec<String> {
  let namespace = namespace.filter(|_| dialect.supports_namespaces());
  let mut statements = Vec::new();

  match (namespace, mode) {
    (Some(ns), CreateMode::Recreate) => {
      statements.push(format!("drop schema if exists {} cascade", dialect.quote(ns)));
      statements.push(format!("create schema {}", dialect.quote(ns)));
    }
    (Some(ns), _) => statements.push(format!("create schema if not exists {}", dialect.quote(ns))),
    (None, CreateMode::Recreate) => {
      let cascade = if dialect == Dialect::Sqlite { "" } else { " cascade" };
      for table in model.tables().iter().rev() {
        statements.push(format!("drop table if exists {}{cascade}", dialect.table_name(None, &table.name)));
      }
    }
    (None, _) => {}
  }

  for table in model.tables() {
    let if_absent = mode == CreateMode::CreateIfAbsent;
    statements.push(create_table(model, table, dialect, namespace, if_absent));
    if dialect.supports_comments() {
      statements.extend(comments(table, dialect, namespace));
    }
  }
  statements
}
