//! Caller-supplied options for compiling a schema and loading items.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{dialect::Dialect, model::SqlType};

/// Type of the item identifier column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemIdType {
  #[default]
  Integer,
  #[serde(alias = "text")]
  String,
}

impl ItemIdType {
  pub fn sql_type(self) -> SqlType {
    match self {
      ItemIdType::Integer => SqlType::Integer,
      ItemIdType::String => SqlType::Text,
    }
  }
}

/// What happens when an item id is inserted a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
  /// The `(item, prefix)` uniqueness constraint rejects the batch.
  #[default]
  Reject,
  /// Existing rows of the item are deleted from every table first.
  Replace,
}

/// An additional root-table column whose values are supplied per item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtraColumn {
  pub name:     String,
  #[serde(rename = "type")]
  pub sql_type: SqlType,
}

/// Compiler and loader options, deserialisable from a config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
  pub dialect:          Dialect,
  /// Schema (namespace) qualifier prefixed to every table name.
  pub namespace:        Option<String>,
  pub root_table:       String,
  pub item_col_name:    String,
  pub item_col_type:    ItemIdType,
  pub prefix_col_name:  String,
  /// Literal substring replacements applied before length truncation.
  pub abbreviations:    BTreeMap<String, String>,
  pub extra_columns:    Vec<ExtraColumn>,
  pub batch_size:       usize,
  pub workers:          usize,
  pub duplicate_policy: DuplicatePolicy,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      dialect:          Dialect::Postgres,
      namespace:        None,
      root_table:       "root".to_owned(),
      item_col_name:    "item_id".to_owned(),
      item_col_type:    ItemIdType::Integer,
      prefix_col_name:  "prefix".to_owned(),
      abbreviations:    BTreeMap::new(),
      extra_columns:    Vec::new(),
      batch_size:       1000,
      workers:          1,
      duplicate_policy: DuplicatePolicy::Reject,
    }
  }
}

impl Options {
  pub fn with_dialect(mut self, dialect: Dialect) -> Self {
    self.dialect = dialect;
    self
  }

  pub fn with_abbreviation(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
    self.abbreviations.insert(from.into(), to.into());
    self
  }
}
