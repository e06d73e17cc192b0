//! The `Store` trait: the only way the loader and linker touch a database.
//!
//! Every statement is rendered by this crate for the store's dialect; a
//! backend only executes it. Backends live in their own crates (e.g.
//! `strata-store-sqlite`).

use std::future::Future;

use crate::value::SqlValue;

/// Rows bound into one prepared insert statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
  pub table:     String,
  /// Insert statement with one positional placeholder per column.
  pub statement: String,
  pub rows:      Vec<Vec<SqlValue>>,
}

/// A database the generated statements run against.
///
/// Methods return `Send` futures so loads can fan out over tokio tasks.
pub trait Store: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Execute one DDL or DML statement, returning the number of rows
  /// affected.
  fn execute(&self, sql: String) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Run a query whose single result cell is a count.
  fn query_count(&self, sql: String) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Append all rows of `batch` in a single transaction.
  fn append_rows(&self, batch: RowBatch) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
