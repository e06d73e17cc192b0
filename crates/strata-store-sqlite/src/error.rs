//! Error type for `strata-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("count query returned a negative value: {0}")]
  NegativeCount(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
