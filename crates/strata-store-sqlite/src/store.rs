//! [`SqliteStore`], the SQLite implementation of [`Store`].

use std::path::Path;

use rusqlite::types::Value;
use strata_core::store::{RowBatch, Store};

use crate::{Error, Result, encode::encode_value};

/// Applied once per connection.
const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A strata store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a database at `path`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  /// Open an in-memory database, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  async fn init(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a query and return every row as raw SQLite values.
  pub async fn fetch_all(&self, sql: impl Into<String>) -> Result<Vec<Vec<Value>>> {
    let sql = sql.into();
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let width = stmt.column_count();
        let rows = stmt
          .query_map([], |row| (0..width).map(|i| row.get::<_, Value>(i)).collect())?
          .collect::<rusqlite::Result<Vec<Vec<Value>>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }
}

// ─── Store impl ──────────────────────────────────────────────────────────────

impl Store for SqliteStore {
  type Error = Error;

  async fn execute(&self, sql: String) -> Result<u64> {
    let changed = self
      .conn
      .call(move |conn| {
        tracing::trace!(%sql, "execute");
        let changed = conn.execute(&sql, [])?;
        Ok(changed as u64)
      })
      .await?;
    Ok(changed)
  }

  async fn query_count(&self, sql: String) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
      .await?;
    u64::try_from(count).map_err(|_| Error::NegativeCount(count))
  }

  async fn append_rows(&self, batch: RowBatch) -> Result<u64> {
    let RowBatch { table, statement, rows } = batch;
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0u64;
        {
          let mut stmt = tx.prepare_cached(&statement)?;
          for row in rows {
            stmt.execute(rusqlite::params_from_iter(row.into_iter().map(encode_value)))?;
            inserted += 1;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    tracing::trace!(%table, inserted, "appended rows");
    Ok(inserted)
  }
}
