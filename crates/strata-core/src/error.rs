//! Error types for `strata-core`.
//!
//! Compilation errors (`SchemaResolution`, `NamingCollision`) are fatal and
//! abort model construction. Load-time conversion and shape problems are not
//! errors at all; they are [`LoadIssue`](crate::flatten::LoadIssue)s tallied
//! in the returned failure counts.

use std::fmt;

use thiserror::Error;

/// The pipeline phase a store error surfaced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Create,
  Insert,
  Link,
  Analyze,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Phase::Create => "create",
      Phase::Insert => "insert",
      Phase::Link => "link",
      Phase::Analyze => "analyze",
    })
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("schema resolution failed at {path}: {reason}")]
  SchemaResolution { path: String, reason: String },

  #[error(
    "identifier {identifier:?} in {table} is produced by both {first} and \
     {second}; supply an abbreviation"
  )]
  NamingCollision {
    table:      String,
    identifier: String,
    first:      String,
    second:     String,
  },

  #[error("abbreviation {from:?} -> {to:?} is not idempotent")]
  InvalidAbbreviation { from: String, to: String },

  #[error("item id {found} does not match the configured {expected} type")]
  InvalidItemId { expected: String, found: String },

  #[error("unknown extra column: {0}")]
  UnknownExtraColumn(String),

  #[error("{count} value(s) of {table}.{column} reference no row")]
  ConstraintViolation {
    table:  String,
    column: String,
    count:  u64,
  },

  #[error("store error during {phase}: {source}")]
  Store {
    phase:  Phase,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("load worker failed: {0}")]
  Worker(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  pub(crate) fn resolution(path: impl fmt::Display, reason: impl Into<String>) -> Self {
    Error::SchemaResolution {
      path:   path.to_string(),
      reason: reason.into(),
    }
  }

  pub(crate) fn store<E>(phase: Phase) -> impl FnOnce(E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    move |e| Error::Store {
      phase,
      source: Box::new(e),
    }
  }
}

/// A relationship whose data violates its single-valued assumption.
///
/// Reported by the linker; the relationship is left unlinked and the other
/// relationships proceed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
  "{ambiguous_rows} row(s) of {table} match more than one {target} row for \
   {column}"
)]
pub struct LinkIntegrityError {
  pub table:          String,
  pub column:         String,
  pub target:         String,
  pub ambiguous_rows: u64,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
