//! strata command-line loader.
//!
//! Compiles a JSON Schema into tables in a SQLite database, then loads a
//! JSON-lines file of `{"id": .., "data": {..}, "extra": {..}}` records and
//! links the result:
//!
//! ```
//! strata --database loans.db schema.json items.jsonl
//! ```
//!
//! Compiler options come from `strata.toml` (or `--config`) and `STRATA_*`
//! environment variables.

use std::{
  collections::BTreeMap,
  fs,
  io::{BufRead, BufReader},
  path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use serde_json::Value;
use strata_core::{CreateMode, InsertOptions, Item, ItemId, Options, Translator, dialect::Dialect};
use strata_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
  Create,
  CreateIfAbsent,
  Recreate,
}

impl From<Mode> for CreateMode {
  fn from(mode: Mode) -> Self {
    match mode {
      Mode::Create => CreateMode::Create,
      Mode::CreateIfAbsent => CreateMode::CreateIfAbsent,
      Mode::Recreate => CreateMode::Recreate,
    }
  }
}

#[derive(Parser)]
#[command(author, version, about = "Load JSON documents into relational tables")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "strata.toml")]
  config: PathBuf,

  /// SQLite database file; overrides `database` from the config.
  #[arg(short, long)]
  database: Option<PathBuf>,

  /// JSON file of definitions consulted for `$ref`s the schema lacks.
  #[arg(long)]
  definitions: Option<PathBuf>,

  #[arg(long, value_enum, default_value_t = Mode::CreateIfAbsent)]
  mode: Mode,

  /// Flatten and count failures without writing rows.
  #[arg(long)]
  dry_run: bool,

  /// Print the DDL for the configured dialect and exit.
  #[arg(long)]
  print_ddl: bool,

  /// The JSON Schema document.
  schema: PathBuf,

  /// JSON-lines file of items to load.
  data: Option<PathBuf>,
}

#[derive(Deserialize)]
struct Settings {
  #[serde(default = "default_database")]
  database: PathBuf,
  #[serde(flatten)]
  options:  Options,
}

fn default_database() -> PathBuf { PathBuf::from("strata.db") }

#[derive(Deserialize)]
struct Record {
  id:    Value,
  data:  Value,
  #[serde(default)]
  extra: BTreeMap<String, Value>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings: Settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("STRATA").try_parsing(true))
    .build()
    .context("failed to read config file")?
    .try_deserialize()
    .context("failed to deserialise settings")?;

  let mut options = settings.options;
  if !cli.print_ddl && options.dialect != Dialect::Sqlite {
    tracing::warn!(dialect = ?options.dialect, "loading into SQLite; ignoring configured dialect");
    options.dialect = Dialect::Sqlite;
  }

  let schema = read_json(&cli.schema)?;
  let translator = match &cli.definitions {
    Some(path) => {
      let definitions = read_json(path)?;
      let Some(definitions) = definitions.as_object() else {
        bail!("definitions file {path:?} must hold a JSON object");
      };
      Translator::with_definitions(&schema, definitions, options)
    }
    None => Translator::new(&schema, options),
  }
  .context("failed to compile schema")?;

  if cli.print_ddl {
    for statement in translator.ddl(cli.mode.into()) {
      println!("{statement};");
    }
    return Ok(());
  }

  let database = cli.database.unwrap_or(settings.database);
  let store = SqliteStore::open(&database)
    .await
    .with_context(|| format!("failed to open database at {database:?}"))?;

  translator
    .create_tables(&store, cli.mode.into())
    .await
    .context("failed to create tables")?;

  let Some(data) = cli.data else {
    return Ok(());
  };
  let items = read_items(&data)?;

  let insert = InsertOptions {
    dry_run: cli.dry_run,
    ..InsertOptions::from(translator.options())
  };
  let report = translator
    .insert_items(&store, items, insert)
    .await
    .context("failed to insert items")?;
  for (path, count) in report.failures.iter() {
    tracing::warn!(path, count, "values failed to load");
  }
  if cli.dry_run {
    return Ok(());
  }

  let links = translator.create_links(&store).await.context("failed to link tables")?;
  for error in &links.integrity_errors {
    tracing::error!(%error, "link left unresolved");
  }
  translator.analyze(&store).await.context("failed to analyze tables")?;

  Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
  let text = fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
  serde_json::from_str(&text).with_context(|| format!("{path:?} is not valid JSON"))
}

fn read_items(path: &Path) -> anyhow::Result<Vec<Item>> {
  let file = fs::File::open(path).with_context(|| format!("failed to open {path:?}"))?;
  let mut items = Vec::new();
  for (n, line) in BufReader::new(file).lines().enumerate() {
    let line = line.with_context(|| format!("failed to read {path:?}"))?;
    if line.trim().is_empty() {
      continue;
    }
    let record: Record =
      serde_json::from_str(&line).with_context(|| format!("{path:?} line {}: invalid record", n + 1))?;
    let id = match record.id {
      Value::Number(number) if number.is_i64() => ItemId::Integer(number.as_i64().unwrap_or_default()),
      Value::String(s) => ItemId::Text(s),
      other => bail!("{path:?} line {}: unsupported item id {other}", n + 1),
    };
    items.push(Item {
      id,
      document: record.data,
      extra: record.extra,
    });
  }
  Ok(items)
}
