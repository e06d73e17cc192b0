//! Bulk loading: flatten items and append their rows, table by table.
//!
//! Items are independent, so the load fans out over `workers` tokio tasks.
//! Each task owns its buffers and reports its own failure counts; the
//! counts are summed when the tasks are joined.

use std::{collections::BTreeMap, sync::Arc};

use serde_json::Value;
use tokio::task::JoinSet;

use crate::{
  Error, Result,
  config::{DuplicatePolicy, ItemIdType, Options},
  dialect::Dialect,
  error::Phase,
  flatten::{FailureCounts, LoadIssue, RowRecord, flatten},
  model::{ColumnRole, SqlType, TableModel, TableSpec},
  schema::{Format, Primitive, Scalar, SchemaPath},
  store::{RowBatch, Store},
  value::{ItemId, SqlValue, convert_column},
};

/// One document to load.
#[derive(Debug, Clone)]
pub struct Item {
  pub id:       ItemId,
  pub document: Value,
  /// Values for configured extra root-table columns, by name.
  pub extra:    BTreeMap<String, Value>,
}

impl Item {
  pub fn new(id: impl Into<ItemId>, document: Value) -> Self {
    Self {
      id: id.into(),
      document,
      extra: BTreeMap::new(),
    }
  }

  pub fn with_extra(mut self, name: impl Into<String>, value: Value) -> Self {
    self.extra.insert(name.into(), value);
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOptions {
  /// Items per flush, and rows per append statement batch.
  pub batch_size:       usize,
  pub workers:          usize,
  pub duplicate_policy: DuplicatePolicy,
  /// Flatten and count without writing anything.
  pub dry_run:          bool,
}

impl Default for InsertOptions {
  fn default() -> Self { Self::from(&Options::default()) }
}

impl From<&Options> for InsertOptions {
  fn from(options: &Options) -> Self {
    Self {
      batch_size:       options.batch_size.max(1),
      workers:          options.workers.max(1),
      duplicate_policy: options.duplicate_policy,
      dry_run:          false,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
  pub items:    u64,
  pub rows:     u64,
  pub failures: FailureCounts,
}

impl InsertReport {
  fn merge(&mut self, other: InsertReport) {
    self.items += other.items;
    self.rows += other.rows;
    self.failures.merge(other.failures);
  }
}

// ─── Loader ──────────────────────────────────────────────────────────────────

/// Everything a load worker needs; cheap to clone.
#[derive(Debug, Clone)]
pub struct Loader {
  model:      Arc<TableModel>,
  dialect:    Dialect,
  namespace:  Option<String>,
  item_type:  ItemIdType,
  statements: Arc<BTreeMap<String, String>>,
}

fn scalar_for(sql_type: SqlType) -> Scalar {
  let (primitive, format) = match sql_type {
    SqlType::Integer => (Primitive::Integer, None),
    SqlType::Float => (Primitive::Number, None),
    SqlType::Boolean => (Primitive::Boolean, None),
    SqlType::Timestamp => (Primitive::String, Some(Format::DateTime)),
    SqlType::Date => (Primitive::String, Some(Format::Date)),
    SqlType::Text | SqlType::TextArray => (Primitive::String, None),
  };
  Scalar {
    primitive,
    format,
    enumeration: None,
    array: sql_type == SqlType::TextArray,
    comment: None,
  }
}

impl Loader {
  pub fn new(model: Arc<TableModel>, options: &Options) -> Self {
    let namespace = options.namespace.clone();
    let statements = model
      .tables()
      .iter()
      .map(|t| (t.name.clone(), insert_statement(options.dialect, namespace.as_deref(), t)))
      .collect();
    Self {
      model,
      dialect: options.dialect,
      namespace,
      item_type: options.item_col_type,
      statements: Arc::new(statements),
    }
  }

  /// Flatten and append `items`. Conversion and shape problems are counted,
  /// not raised; store errors and invalid item ids abort the load.
  pub async fn insert<S>(
    &self,
    store: &S,
    items: impl IntoIterator<Item = Item>,
    options: InsertOptions,
  ) -> Result<InsertReport>
  where
    S: Store + Clone + 'static,
  {
    let mut items: Vec<Item> = items.into_iter().collect();
    let per_worker = items.len().div_ceil(options.workers.max(1)).max(1);

    let mut workers = JoinSet::new();
    while !items.is_empty() {
      let rest = items.split_off(per_worker.min(items.len()));
      let chunk = std::mem::replace(&mut items, rest);
      let loader = self.clone();
      let store = store.clone();
      workers.spawn(async move { loader.run_worker(&store, chunk, options).await });
    }

    let mut report = InsertReport::default();
    while let Some(joined) = workers.join_next().await {
      report.merge(joined.map_err(|e| Error::Worker(e.to_string()))??);
    }

    tracing::info!(
      items = report.items,
      rows = report.rows,
      failures = report.failures.total(),
      dry_run = options.dry_run,
      "inserted items"
    );
    Ok(report)
  }

  async fn run_worker<S: Store>(
    &self,
    store: &S,
    items: Vec<Item>,
    options: InsertOptions,
  ) -> Result<InsertReport> {
    let mut report = InsertReport::default();
    let batch_size = options.batch_size.max(1);
    let mut items = items.into_iter().peekable();

    while items.peek().is_some() {
      let group: Vec<Item> = items.by_ref().take(batch_size).collect();
      let mut buffers: BTreeMap<String, Vec<Vec<SqlValue>>> = BTreeMap::new();

      for item in &group {
        for (table, row) in self.item_rows(item, &mut report.failures)? {
          buffers.entry(table).or_default().push(row);
        }
        report.items += 1;
      }
      report.rows += buffers.values().map(|rows| rows.len() as u64).sum::<u64>();

      if options.dry_run {
        continue;
      }
      if options.duplicate_policy == DuplicatePolicy::Replace {
        self.delete_items(store, &group).await?;
      }
      for (table, rows) in buffers {
        self.append(store, &table, rows, batch_size).await?;
      }
    }
    Ok(report)
  }

  /// Flatten one item into `(table, values)` pairs in insert-column order.
  fn item_rows(&self, item: &Item, failures: &mut FailureCounts) -> Result<Vec<(String, Vec<SqlValue>)>> {
    item.id.check(self.item_type)?;

    let flattened = flatten(&self.model, &item.document);
    let mut rows = flattened.rows;
    let mut issues = flattened.issues;
    if let Some(root) = rows.first_mut() {
      self.apply_extras(item, root, &mut issues)?;
    }

    for issue in &issues {
      tracing::debug!(item = %item.id, %issue, "load issue");
      failures.record(issue);
    }

    Ok(
      rows
        .into_iter()
        .filter_map(|row| {
          let table = self.model.table(&row.table)?;
          Some((row.table.clone(), self.materialize(table, &item.id, row)))
        })
        .collect(),
    )
  }

  fn apply_extras(&self, item: &Item, root: &mut RowRecord, issues: &mut Vec<LoadIssue>) -> Result<()> {
    for (name, value) in &item.extra {
      let Some(slot) = self.model.extra_columns().iter().find(|s| &s.name == name) else {
        return Err(Error::UnknownExtraColumn(name.clone()));
      };
      if value.is_null() {
        continue;
      }
      match convert_column(value, &[scalar_for(slot.sql_type)], slot.sql_type) {
        Ok(converted) => {
          root.values.insert(slot.column.clone(), converted);
        }
        Err(source) => issues.push(LoadIssue::TypeConversion {
          path: SchemaPath::root().child(name.as_str()),
          source,
        }),
      }
    }
    Ok(())
  }

  fn materialize(&self, table: &TableSpec, item: &ItemId, mut row: RowRecord) -> Vec<SqlValue> {
    table
      .insert_columns()
      .map(|column| match column.role {
        ColumnRole::ItemId => item.to_value(),
        ColumnRole::Prefix => SqlValue::Text(row.prefix.clone()),
        _ => row
          .values
          .remove(&column.name)
          .map(|v| self.dialect.adapt(v))
          .unwrap_or(SqlValue::Null),
      })
      .collect()
  }

  async fn delete_items<S: Store>(&self, store: &S, items: &[Item]) -> Result<()> {
    let ids: Vec<String> = items
      .iter()
      .map(|item| match &item.id {
        ItemId::Integer(i) => i.to_string(),
        ItemId::Text(s) => crate::dialect::string_literal(s),
      })
      .collect();
    let item_column = self.dialect.quote(self.model.item_column());
    for table in self.model.tables() {
      let sql = format!(
        "delete from {} where {item_column} in ({})",
        self.dialect.table_name(self.namespace.as_deref(), &table.name),
        ids.join(", ")
      );
      tracing::debug!(%sql, "replacing existing rows");
      store.execute(sql).await.map_err(Error::store(Phase::Insert))?;
    }
    Ok(())
  }

  async fn append<S: Store>(
    &self,
    store: &S,
    table: &str,
    rows: Vec<Vec<SqlValue>>,
    batch_size: usize,
  ) -> Result<()> {
    let Some(statement) = self.statements.get(table) else {
      return Err(Error::resolution(table, "no insert statement for table"));
    };
    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
      let batch = RowBatch {
        table:     table.to_owned(),
        statement: statement.clone(),
        rows:      rows.by_ref().take(batch_size).collect(),
      };
      store.append_rows(batch).await.map_err(Error::store(Phase::Insert))?;
    }
    Ok(())
  }
}

/// `insert into <table> (<insert columns>) values (<placeholders>)`.
pub fn insert_statement(dialect: Dialect, namespace: Option<&str>, table: &TableSpec) -> String {
  let columns: Vec<String> = table.insert_columns().map(|c| dialect.quote(&c.name)).collect();
  let placeholders: Vec<String> = (1..=columns.len()).map(|n| dialect.placeholder(n)).collect();
  format!(
    "insert into {} ({}) values ({})",
    dialect.table_name(namespace, &table.name),
    columns.join(", "),
    placeholders.join(", ")
  )
}
