//! End-to-end tests: compile, create, insert and link against an in-memory
//! database.

use rusqlite::types::Value;
use serde_json::json;
use strata_core::{
  CreateMode, Error as CoreError, InsertOptions, Item, Options, Store, Translator,
  config::{DuplicatePolicy, ExtraColumn},
  dialect::Dialect,
  error::Phase,
  model::SqlType,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn options() -> Options {
  Options::default()
    .with_dialect(Dialect::Sqlite)
    .with_abbreviation("AbbreviateThisReallyLongColumn", "AbbTRLC")
}

fn loan_schema() -> serde_json::Value {
  json!({
    "comment": "the root of everything",
    "type": "object",
    "definitions": {
      "basicAddress": {
        "type": "object",
        "properties": {
          "City": { "type": "string" },
          "ZipCode": { "type": "string" }
        }
      },
      "address": {
        "allOf": [
          { "$ref": "#/definitions/basicAddress" },
          {
            "type": "object",
            "properties": {
              "Latitude": { "type": "number" },
              "Longitude": { "type": "number" }
            }
          }
        ]
      }
    },
    "properties": {
      "Loan": {
        "type": "object",
        "properties": {
          "Amount": { "type": "integer" },
          "AbbreviateThisReallyLongColumn": { "type": "string" }
        }
      },
      "SubjectProperty": {
        "type": "object",
        "properties": {
          "Acreage": { "type": "number" },
          "Address": { "$ref": "#/definitions/address" }
        }
      },
      "RealEstateOwned": {
        "type": "object",
        "patternProperties": {
          "^[0-9]+$": {
            "type": "object",
            "properties": {
              "Address": { "$ref": "#/definitions/address" },
              "RentalIncome": { "type": "integer" }
            }
          }
        }
      }
    }
  })
}

fn loan_document() -> serde_json::Value {
  json!({
    "Loan": { "Amount": 500000 },
    "SubjectProperty": {
      "Acreage": 42,
      "Address": { "City": "New York", "ZipCode": "12345", "Latitude": 43 }
    },
    "RealEstateOwned": {
      "1": { "Address": { "City": "Brooklyn", "ZipCode": "65432" }, "RentalIncome": 1000 }
    }
  })
}

async fn created(translator: &Translator) -> SqliteStore {
  let s = store().await;
  translator.create_tables(&s, CreateMode::Create).await.unwrap();
  s
}

fn int(v: &Value) -> i64 {
  match v {
    Value::Integer(i) => *i,
    other => panic!("expected integer, got {other:?}"),
  }
}

fn text(s: &str) -> Value { Value::Text(s.to_owned()) }

async fn count(s: &SqliteStore, table: &str) -> u64 {
  s.query_count(format!("select count(*) from \"{table}\"")).await.unwrap()
}

// ─── Loan example ────────────────────────────────────────────────────────────

#[tokio::test]
async fn loan_example_end_to_end() {
  let translator = Translator::new(&loan_schema(), options()).unwrap();
  let s = created(&translator).await;

  let report = translator
    .insert_items(&s, [Item::new(1_000_000_000, loan_document())], InsertOptions::default())
    .await
    .unwrap();
  assert_eq!(report.rows, 4);
  assert!(report.failures.is_empty());

  let links = translator.create_links(&s).await.unwrap();
  assert!(links.integrity_errors.is_empty());
  assert_eq!(links.linked, 4);
  translator.analyze(&s).await.unwrap();

  let root = s
    .fetch_all(
      "select \"id\", \"item_id\", \"prefix\", \"loan__amount\", \"subject_property__acreage\", \
       \"subject_property__address__latitude\", \"subject_property__address__longitude\", \
       \"subject_property__address_id\" from \"root\"",
    )
    .await
    .unwrap();
  assert_eq!(root.len(), 1);
  let root = &root[0];
  assert_eq!(root[1], Value::Integer(1_000_000_000));
  assert_eq!(root[2], text(""));
  assert_eq!(root[3], Value::Integer(500000));
  assert_eq!(root[4], Value::Real(42.0));
  assert_eq!(root[5], Value::Real(43.0));
  assert_eq!(root[6], Value::Null);
  let root_id = int(&root[0]);

  let addresses = s
    .fetch_all("select \"id\", \"prefix\", \"city\", \"root_id\" from \"basic_address\" order by \"prefix\"")
    .await
    .unwrap();
  assert_eq!(addresses.len(), 2);
  assert_eq!(addresses[0][1], text("/RealEstateOwned/1/Address"));
  assert_eq!(addresses[0][2], text("Brooklyn"));
  assert_eq!(addresses[1][1], text("/SubjectProperty/Address"));
  assert_eq!(addresses[1][2], text("New York"));
  assert_eq!(int(&addresses[0][3]), root_id);
  assert_eq!(int(&addresses[1][3]), root_id);

  assert_eq!(int(&root[7]), int(&addresses[1][0]));

  let reo = s
    .fetch_all("select \"prefix\", \"rental_income\", \"address_id\", \"root_id\" from \"real_estate_owned\"")
    .await
    .unwrap();
  assert_eq!(reo.len(), 1);
  assert_eq!(reo[0][0], text("/RealEstateOwned/1"));
  assert_eq!(reo[0][1], Value::Integer(1000));
  assert_eq!(int(&reo[0][2]), int(&addresses[0][0]));
  assert_eq!(int(&reo[0][3]), root_id);
}

#[tokio::test]
async fn linking_is_rerunnable() {
  let translator = Translator::new(&loan_schema(), options()).unwrap();
  let s = created(&translator).await;
  translator
    .insert_items(&s, [Item::new(1, loan_document())], InsertOptions::default())
    .await
    .unwrap();

  let first = translator.create_links(&s).await.unwrap();
  let second = translator.create_links(&s).await.unwrap();
  assert_eq!(first, second);
}

// ─── Load behaviour ──────────────────────────────────────────────────────────

#[tokio::test]
async fn conversion_failure_keeps_the_rest_of_the_item() {
  let translator = Translator::new(&loan_schema(), options()).unwrap();
  let s = created(&translator).await;

  let document = json!({
    "Loan": { "Amount": "a lot" },
    "SubjectProperty": { "Acreage": 3.5 }
  });
  let report = translator
    .insert_items(&s, [Item::new(1, document)], InsertOptions::default())
    .await
    .unwrap();
  assert_eq!(report.failures.get("/Loan/Amount"), 1);

  let root = s
    .fetch_all("select \"loan__amount\", \"subject_property__acreage\" from \"root\"")
    .await
    .unwrap();
  assert_eq!(root, [[Value::Null, Value::Real(3.5)]]);
}

#[tokio::test]
async fn duplicate_item_is_rejected_by_default() {
  let translator = Translator::new(&loan_schema(), options()).unwrap();
  let s = created(&translator).await;

  let insert = || translator.insert_items(&s, [Item::new(1, loan_document())], InsertOptions::default());
  insert().await.unwrap();
  let err = insert().await.unwrap_err();
  assert!(matches!(err, CoreError::Store { phase: Phase::Insert, .. }), "{err}");
  assert_eq!(count(&s, "root").await, 1);
}

#[tokio::test]
async fn duplicate_item_replaces_with_replace_policy() {
  let translator = Translator::new(&loan_schema(), options()).unwrap();
  let s = created(&translator).await;
  let insert = InsertOptions {
    duplicate_policy: DuplicatePolicy::Replace,
    ..InsertOptions::default()
  };

  translator.insert_items(&s, [Item::new(1, loan_document())], insert).await.unwrap();
  let changed = json!({ "Loan": { "Amount": 7 } });
  translator.insert_items(&s, [Item::new(1, changed)], insert).await.unwrap();

  assert_eq!(count(&s, "root").await, 1);
  assert_eq!(count(&s, "basic_address").await, 0);
  assert_eq!(count(&s, "real_estate_owned").await, 0);
  let amount = s.fetch_all("select \"loan__amount\" from \"root\"").await.unwrap();
  assert_eq!(amount, [[Value::Integer(7)]]);
}

#[tokio::test]
async fn load_is_order_and_batch_independent() {
  let translator = Translator::new(&loan_schema(), options()).unwrap();
  let items: Vec<Item> = (1..=6)
    .map(|i| {
      let mut document = loan_document();
      document["Loan"]["Amount"] = json!(i * 100);
      Item::new(i, document)
    })
    .collect();

  let linked_view = "select r.\"item_id\", r.\"loan__amount\", a.\"prefix\", a.\"city\" from \"root\" r \
                     join \"basic_address\" a on a.\"id\" = r.\"subject_property__address_id\" \
                     order by r.\"item_id\"";

  let forward = created(&translator).await;
  translator
    .insert_items(&forward, items.clone(), InsertOptions::default())
    .await
    .unwrap();
  translator.create_links(&forward).await.unwrap();

  let shuffled = created(&translator).await;
  let reversed: Vec<Item> = items.into_iter().rev().collect();
  let insert = InsertOptions { batch_size: 1, workers: 3, ..InsertOptions::default() };
  translator.insert_items(&shuffled, reversed, insert).await.unwrap();
  translator.create_links(&shuffled).await.unwrap();

  let expected = forward.fetch_all(linked_view).await.unwrap();
  assert_eq!(expected.len(), 6);
  assert_eq!(expected, shuffled.fetch_all(linked_view).await.unwrap());
}

#[tokio::test]
async fn dry_run_writes_nothing() {
  let translator = Translator::new(&loan_schema(), options()).unwrap();
  let s = created(&translator).await;
  let insert = InsertOptions { dry_run: true, ..InsertOptions::default() };

  let report = translator.insert_items(&s, [Item::new(1, loan_document())], insert).await.unwrap();
  assert_eq!(report.rows, 4);
  assert_eq!(count(&s, "root").await, 0);
}

#[tokio::test]
async fn extra_columns_are_stored_on_root() {
  let mut opts = options();
  opts.extra_columns.push(ExtraColumn {
    name:     "loan_period".to_owned(),
    sql_type: SqlType::Integer,
  });
  let translator = Translator::new(&loan_schema(), opts).unwrap();
  let s = created(&translator).await;

  let item = Item::new(1, loan_document()).with_extra("loan_period", json!(360));
  translator.insert_items(&s, [item], InsertOptions::default()).await.unwrap();
  let rows = s.fetch_all("select \"loan_period\" from \"root\"").await.unwrap();
  assert_eq!(rows, [[Value::Integer(360)]]);
}

// ─── Tables and links ────────────────────────────────────────────────────────

#[tokio::test]
async fn create_modes() {
  let translator = Translator::new(&loan_schema(), options()).unwrap();
  let s = created(&translator).await;

  assert!(translator.create_tables(&s, CreateMode::Create).await.is_err());
  translator.create_tables(&s, CreateMode::CreateIfAbsent).await.unwrap();

  translator
    .insert_items(&s, [Item::new(1, loan_document())], InsertOptions::default())
    .await
    .unwrap();
  translator.create_tables(&s, CreateMode::Recreate).await.unwrap();
  assert_eq!(count(&s, "root").await, 0);
}

#[tokio::test]
async fn pattern_collection_of_shared_definition() {
  let schema = json!({
    "type": "object",
    "definitions": {
      "file": {
        "type": "object",
        "properties": { "Name": { "type": "string" }, "Size": { "type": "integer" } }
      }
    },
    "properties": {
      "aBunchOfDocuments": {
        "type": "object",
        "patternProperties": { ".*": { "$ref": "#/definitions/file" } }
      },
      "moreDocuments": {
        "type": "object",
        "patternProperties": { ".*": { "$ref": "#/definitions/file" } }
      }
    }
  });
  let translator = Translator::new(&schema, Options::default().with_dialect(Dialect::Sqlite)).unwrap();
  let tables: Vec<_> = translator.model().tables().iter().map(|t| t.name.as_str()).collect();
  assert_eq!(tables, ["root", "a_bunch_of_documents", "file", "more_documents"]);

  let s = created(&translator).await;
  let document = json!({
    "aBunchOfDocuments": { "x": { "Name": "a.pdf", "Size": 10 }, "y": { "Name": "b.pdf" } },
    "moreDocuments": { "z": { "Name": "c.pdf" } }
  });
  translator
    .insert_items(&s, [Item::new(5, document)], InsertOptions::default())
    .await
    .unwrap();
  let links = translator.create_links(&s).await.unwrap();
  assert!(links.integrity_errors.is_empty());

  let bunch = s
    .fetch_all(
      "select d.\"prefix\", f.\"name\", f.\"a_bunch_of_documents_id\" = d.\"id\" from \"a_bunch_of_documents\" d \
       join \"file\" f on f.\"id\" = d.\"file_id\" order by d.\"prefix\"",
    )
    .await
    .unwrap();
  assert_eq!(bunch, [
    [text("/aBunchOfDocuments/x"), text("a.pdf"), Value::Integer(1)],
    [text("/aBunchOfDocuments/y"), text("b.pdf"), Value::Integer(1)],
  ]);

  let more = s
    .fetch_all(
      "select f.\"name\" from \"more_documents\" d join \"file\" f on f.\"id\" = d.\"file_id\"",
    )
    .await
    .unwrap();
  assert_eq!(more, [[text("c.pdf")]]);
}

#[tokio::test]
async fn ambiguous_back_reference_is_reported() {
  let translator = Translator::new(&loan_schema(), options()).unwrap();
  let s = created(&translator).await;
  translator
    .insert_items(&s, [Item::new(1, loan_document())], InsertOptions::default())
    .await
    .unwrap();
  // A second root-table row that is also an ancestor of /SubjectProperty/Address.
  s.execute("insert into \"root\" (\"item_id\", \"prefix\") values (1, '/SubjectProperty')".to_owned())
    .await
    .unwrap();

  let report = translator.create_links(&s).await.unwrap();
  assert_eq!(report.integrity_errors.len(), 1);
  let error = &report.integrity_errors[0];
  assert_eq!((error.table.as_str(), error.column.as_str()), ("basic_address", "root_id"));
  assert_eq!(error.ambiguous_rows, 1);
  assert_eq!(report.linked, 3);

  let unlinked = s
    .query_count("select count(*) from \"basic_address\" where \"root_id\" is null".to_owned())
    .await
    .unwrap();
  assert_eq!(unlinked, 2);
}

#[tokio::test]
async fn item_id_type_mismatch_is_an_error() {
  let translator = Translator::new(&loan_schema(), options()).unwrap();
  let s = created(&translator).await;
  let err = translator
    .insert_items(&s, [Item::new("one", loan_document())], InsertOptions::default())
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InvalidItemId { .. }));
}
