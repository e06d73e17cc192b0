//! Compile a JSON Schema into relational tables and bulk-load documents into
//! them.
//!
//! The compile phase ([`schema`] → [`naming`] → [`model`] → [`ddl`]) is pure
//! and deterministic. Loading runs in two phases against a [`Store`]:
//! append-only inserts ([`load`]), then one set-based link pass ([`link`])
//! that fills in foreign keys. [`Translator`] drives the whole sequence.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod config;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod flatten;
pub mod link;
pub mod load;
pub mod model;
pub mod naming;
pub mod schema;
pub mod store;
pub mod value;

use std::sync::Arc;

use serde_json::{Map, Value};

pub use config::Options;
pub use ddl::CreateMode;
pub use error::{Error, Result};
pub use load::{InsertOptions, InsertReport, Item};
pub use link::LinkReport;
pub use model::TableModel;
pub use store::Store;
pub use value::ItemId;

use crate::{error::Phase, link::Linker, load::Loader, schema::Resolver};

/// A compiled schema plus the options it was compiled with.
#[derive(Debug, Clone)]
pub struct Translator {
  options: Options,
  model:   Arc<TableModel>,
  loader:  Loader,
}

impl Translator {
  pub fn new(schema: &Value, options: Options) -> Result<Self> {
    Self::compile(Resolver::new(schema), options)
  }

  /// Like [`Translator::new`], resolving unknown `$ref`s against
  /// `definitions`.
  pub fn with_definitions(schema: &Value, definitions: &Map<String, Value>, options: Options) -> Result<Self> {
    Self::compile(Resolver::new(schema).with_definitions(definitions), options)
  }

  fn compile(resolver: Resolver<'_>, options: Options) -> Result<Self> {
    let resolved = resolver.resolve()?;
    let model = Arc::new(TableModel::build(&resolved, &options)?);
    let loader = Loader::new(model.clone(), &options);
    tracing::debug!(
      root = model.root_table(),
      shared = resolved.shared.len(),
      "compiled schema"
    );
    Ok(Self { options, model, loader })
  }

  pub fn model(&self) -> &TableModel { &self.model }

  pub fn options(&self) -> &Options { &self.options }

  /// The DDL [`Translator::create_tables`] would run.
  pub fn ddl(&self, mode: CreateMode) -> Vec<String> {
    ddl::generate(&self.model, self.options.dialect, self.options.namespace.as_deref(), mode)
  }

  fn linker(&self) -> Linker<'_> {
    Linker::new(&self.model, self.options.dialect, self.options.namespace.as_deref())
  }

  pub async fn create_tables<S: Store>(&self, store: &S, mode: CreateMode) -> Result<()> {
    for sql in self.ddl(mode) {
      tracing::debug!(%sql, "executing");
      store.execute(sql).await.map_err(Error::store(Phase::Create))?;
    }
    tracing::info!(tables = self.model.tables().len(), ?mode, "created tables");
    Ok(())
  }

  pub async fn insert_items<S>(
    &self,
    store: &S,
    items: impl IntoIterator<Item = Item>,
    options: InsertOptions,
  ) -> Result<InsertReport>
  where
    S: Store + Clone + 'static,
  {
    self.loader.insert(store, items, options).await
  }

  /// Insert with the batch, worker and duplicate settings from [`Options`].
  pub async fn insert_with_defaults<S>(&self, store: &S, items: impl IntoIterator<Item = Item>) -> Result<InsertReport>
  where
    S: Store + Clone + 'static,
  {
    self.insert_items(store, items, InsertOptions::from(&self.options)).await
  }

  /// Run the link pass. Must follow every insert it should cover.
  pub async fn create_links<S: Store>(&self, store: &S) -> Result<LinkReport> {
    self.linker().link(store).await
  }

  /// Refresh planner statistics for every table.
  pub async fn analyze<S: Store>(&self, store: &S) -> Result<()> {
    let dialect = self.options.dialect;
    for table in self.model.tables() {
      let sql = format!("analyze {}", dialect.table_name(self.options.namespace.as_deref(), &table.name));
      store.execute(sql).await.map_err(Error::store(Phase::Analyze))?;
    }
    Ok(())
  }
}
