//! Projection of one document onto table rows, following the model's
//! [`Plan`].
//!
//! Every table boundary reached in the document yields one [`RowRecord`]
//! whose prefix is the JSON Pointer of that location (`""` for the root).
//! Link columns are left empty; the linker fills them in afterwards.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::{
  model::{Plan, TableModel, TablePlan},
  schema::{ANY_KEY, CollectionKeys, SchemaPath},
  value::{ConversionError, SqlValue, convert_column, escape_pointer},
};

/// A non-fatal problem found while flattening a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadIssue {
  #[error("{path}: {source}")]
  TypeConversion {
    path:   SchemaPath,
    #[source]
    source: ConversionError,
  },
  #[error("{path}: expected {expected}, the row is skipped")]
  StructuralMismatch {
    path:     SchemaPath,
    expected: &'static str,
  },
}

impl LoadIssue {
  pub fn path(&self) -> &SchemaPath {
    match self {
      LoadIssue::TypeConversion { path, .. } | LoadIssue::StructuralMismatch { path, .. } => path,
    }
  }
}

/// Number of load issues per schema path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureCounts(BTreeMap<String, u64>);

impl FailureCounts {
  pub fn record(&mut self, issue: &LoadIssue) {
    *self.0.entry(issue.path().to_string()).or_default() += 1;
  }

  pub fn merge(&mut self, other: FailureCounts) {
    for (path, count) in other.0 {
      *self.0.entry(path).or_default() += count;
    }
  }

  pub fn get(&self, path: &str) -> u64 { self.0.get(path).copied().unwrap_or_default() }

  pub fn total(&self) -> u64 { self.0.values().sum() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
    self.0.iter().map(|(path, count)| (path.as_str(), *count))
  }
}

/// One row of one table, before the item id and link columns are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
  pub table:  String,
  pub prefix: String,
  pub values: BTreeMap<String, SqlValue>,
}

impl RowRecord {
  fn new(table: &str, prefix: String) -> Self {
    Self {
      table: table.to_owned(),
      prefix,
      values: BTreeMap::new(),
    }
  }
}

#[derive(Debug, Default)]
pub struct Flattened {
  pub rows:   Vec<RowRecord>,
  pub issues: Vec<LoadIssue>,
}

/// Flatten `document` into rows. The root row comes first.
pub fn flatten(model: &TableModel, document: &Value) -> Flattened {
  let mut out = Flattened::default();
  if !document.is_object() {
    out.issues.push(LoadIssue::StructuralMismatch {
      path:     SchemaPath::root(),
      expected: "object",
    });
    return out;
  }
  out.rows.push(RowRecord::new(model.root_table(), String::new()));
  out.walk(model.plan(), document, 0, "");
  out
}

fn child_prefix(prefix: &str, key: &str) -> String { format!("{prefix}/{}", escape_pointer(key)) }

impl Flattened {
  fn walk(&mut self, plan: &Plan, value: &Value, row: usize, prefix: &str) {
    if value.is_null() {
      return;
    }
    match plan {
      Plan::Column { column, sql_type, variants, path } => {
        match convert_column(value, variants, *sql_type) {
          Ok(converted) => {
            self.rows[row].values.insert(column.clone(), converted);
          }
          Err(source) => self.issues.push(LoadIssue::TypeConversion { path: path.clone(), source }),
        }
      }
      Plan::Object { children, tables, path } => {
        let Value::Object(map) = value else {
          self.issues.push(LoadIssue::StructuralMismatch {
            path:     path.clone(),
            expected: "object",
          });
          return;
        };
        for (name, child) in children {
          if let Some(v) = map.get(name) {
            self.walk(child, v, row, &child_prefix(prefix, name));
          }
        }
        for table in tables {
          self.table(table, value, prefix);
        }
      }
      Plan::Table(table) => self.table(table, value, prefix),
      Plan::Collection { table, keys, value: entry_plan, path } => {
        let entries: Vec<(String, &Value)> = match (keys, value) {
          (CollectionKeys::Pattern, Value::Object(map)) => {
            map.iter().map(|(k, v)| (k.clone(), v)).collect()
          }
          (CollectionKeys::Index, Value::Array(items)) => {
            items.iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect()
          }
          (CollectionKeys::Pattern, _) => return self.mismatch(path, "object"),
          (CollectionKeys::Index, _) => return self.mismatch(path, "array"),
        };
        for (key, entry) in entries {
          if entry.is_null() {
            continue;
          }
          if matches!(entry_plan.as_ref(), Plan::Object { .. }) && !entry.is_object() {
            self.mismatch(&path.child(ANY_KEY), "object");
            continue;
          }
          let entry_prefix = child_prefix(prefix, &key);
          self.rows.push(RowRecord::new(table, entry_prefix.clone()));
          let entry_row = self.rows.len() - 1;
          self.walk(entry_plan, entry, entry_row, &entry_prefix);
        }
      }
    }
  }

  fn table(&mut self, table: &TablePlan, value: &Value, prefix: &str) {
    if !value.is_object() {
      return self.mismatch(&table.path, "object");
    }
    self.rows.push(RowRecord::new(&table.table, prefix.to_owned()));
    let row = self.rows.len() - 1;
    self.walk(&table.body, value, row, prefix);
  }

  fn mismatch(&mut self, path: &SchemaPath, expected: &'static str) {
    self.issues.push(LoadIssue::StructuralMismatch { path: path.clone(), expected });
  }
}
