//! The relational table model compiled from a [`ResolvedSchema`].
//!
//! One walk over the resolved tree allocates a [`TableSpec`] for the root,
//! every shared definition and every pattern collection, names every column
//! through the [`Normalizer`], records the [`LinkEdge`]s the linker will
//! resolve, and emits the [`Plan`] the flattener follows at load time.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use serde::Deserialize;

use crate::{
  Error, Result,
  config::Options,
  naming::Normalizer,
  schema::{
    ANY_KEY, CollectionKeys, CollectionNode, Format, ObjectNode, Primitive, ResolvedSchema,
    Scalar, SchemaNode, SchemaPath, TableNode,
  },
  value::escape_pointer,
};

/// Name of the identity column every table carries.
pub const IDENTITY_COLUMN: &str = "id";

/// Column holding the value of a scalar-valued collection entry.
pub const VALUE_COLUMN: &str = "value";

const TABLES_SCOPE: &str = "tables";

// ─── Column and table specs ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
  #[serde(alias = "string")]
  Text,
  Integer,
  #[serde(alias = "number", alias = "double")]
  Float,
  Boolean,
  Timestamp,
  Date,
  TextArray,
}

impl SqlType {
  fn of_scalar(scalar: &Scalar) -> Self {
    if scalar.array {
      return SqlType::TextArray;
    }
    if scalar.enumeration.is_some() {
      return SqlType::Text;
    }
    match (scalar.primitive, scalar.format) {
      (Primitive::String, Some(Format::DateTime)) => SqlType::Timestamp,
      (Primitive::String, Some(Format::Date)) => SqlType::Date,
      (Primitive::String, _) => SqlType::Text,
      (Primitive::Integer, _) => SqlType::Integer,
      (Primitive::Number, _) => SqlType::Float,
      (Primitive::Boolean, _) => SqlType::Boolean,
    }
  }

  /// The column type able to hold every variant of a union.
  fn widen(variants: &[Scalar]) -> Self {
    let mut types = variants.iter().map(SqlType::of_scalar);
    let Some(first) = types.next() else {
      return SqlType::Text;
    };
    types.fold(first, |acc, t| match (acc, t) {
      (a, b) if a == b => a,
      (SqlType::Integer, SqlType::Float) | (SqlType::Float, SqlType::Integer) => SqlType::Float,
      _ => SqlType::Text,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
  Identity,
  ItemId,
  Prefix,
  Data,
  Extra,
  /// Holds the identity of a row in another table; filled by the linker.
  Link,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
  pub name:     String,
  pub sql_type: SqlType,
  pub nullable: bool,
  pub role:     ColumnRole,
  pub comment:  Option<String>,
}

/// The back-reference from a child table to the table that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
  pub column:       String,
  pub parent_table: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
  pub name:        String,
  pub columns:     Vec<ColumnSpec>,
  pub parent_link: Option<ParentLink>,
  pub shared:      bool,
  pub comment:     Option<String>,
}

impl TableSpec {
  pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
    self.columns.iter().find(|c| c.name == name)
  }

  /// Columns written by the loader, in insert order: item id, prefix, then
  /// data and extra columns.
  pub fn insert_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
    self
      .columns
      .iter()
      .filter(|c| !matches!(c.role, ColumnRole::Identity | ColumnRole::Link))
  }

  pub fn link_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
    self.columns.iter().filter(|c| c.role == ColumnRole::Link)
  }
}

// ─── Links ───────────────────────────────────────────────────────────────────

/// How a row of the link-holding table finds its target row (same item id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
  /// `target.prefix = holder.prefix || '/' || suffix`; equality when the
  /// suffix is empty.
  Descendant { suffix: String },
  /// The target's prefix equals, or is a path-ancestor of, the holder's
  /// prefix.
  Ancestor,
}

/// A parent→child relationship resolved by the linker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEdge {
  /// Table holding the link column.
  pub table:  String,
  pub column: String,
  /// Table whose identity the column references.
  pub target: String,
  pub rule:   MatchRule,
}

// ─── Load plan ───────────────────────────────────────────────────────────────

/// Instructions for projecting a document onto rows, mirroring the schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
  Column {
    column:   String,
    sql_type: SqlType,
    variants: Vec<Scalar>,
    path:     SchemaPath,
  },
  Object {
    children: Vec<(String, Plan)>,
    tables:   Vec<TablePlan>,
    path:     SchemaPath,
  },
  Table(TablePlan),
  Collection {
    table: String,
    keys:  CollectionKeys,
    value: Box<Plan>,
    path:  SchemaPath,
  },
}

/// A table boundary: a new row at the current document location.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePlan {
  pub table: String,
  pub body:  Box<Plan>,
  pub path:  SchemaPath,
}

/// A configured extra root-table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraSlot {
  /// Name callers use when supplying values.
  pub name:     String,
  pub column:   String,
  pub sql_type: SqlType,
}

/// What a schema path maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
  Table { table: String },
  Column { table: String, column: String },
}

// ─── Model ───────────────────────────────────────────────────────────────────

/// Immutable table/column model plus the load plan.
#[derive(Debug, Clone, PartialEq)]
pub struct TableModel {
  root:          String,
  tables:        Vec<TableSpec>,
  index:         BTreeMap<String, usize>,
  links:         Vec<LinkEdge>,
  path_index:    BTreeMap<String, PathTarget>,
  plan:          Plan,
  item_column:   String,
  item_type:     SqlType,
  prefix_column: String,
  extras:        Vec<ExtraSlot>,
}

impl TableModel {
  /// Compile a model from a resolved schema.
  pub fn build(resolved: &ResolvedSchema, options: &Options) -> Result<Self> {
    let normalizer =
      Normalizer::new(&options.abbreviations, options.dialect.max_identifier_len())?;
    Builder::new(options, normalizer).build(&resolved.root)
  }

  pub fn root_table(&self) -> &str { &self.root }

  /// Tables in creation order, root first.
  pub fn tables(&self) -> &[TableSpec] { &self.tables }

  pub fn table(&self, name: &str) -> Option<&TableSpec> {
    self.index.get(name).map(|&i| &self.tables[i])
  }

  pub fn links(&self) -> &[LinkEdge] { &self.links }

  pub fn path_index(&self) -> &BTreeMap<String, PathTarget> { &self.path_index }

  pub fn plan(&self) -> &Plan { &self.plan }

  pub fn item_column(&self) -> &str { &self.item_column }

  pub fn item_type(&self) -> SqlType { self.item_type }

  pub fn prefix_column(&self) -> &str { &self.prefix_column }

  pub fn extra_columns(&self) -> &[ExtraSlot] { &self.extras }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// A column under construction, tagged with the table-relative key that
/// produced it so repeated visits of a shared table are recognised.
struct Registered {
  spec:    ColumnSpec,
  key:     String,
  display: String,
}

struct TableBuilder {
  name:        String,
  columns:     BTreeMap<String, Registered>,
  parent_link: Option<ParentLink>,
  shared:      bool,
  comment:     Option<String>,
}

impl TableBuilder {
  fn finish(self) -> TableSpec {
    let rank = |role: ColumnRole| match role {
      ColumnRole::Identity => 0,
      ColumnRole::ItemId => 1,
      ColumnRole::Prefix => 2,
      ColumnRole::Data | ColumnRole::Extra => 3,
      ColumnRole::Link => 4,
    };
    let mut columns: Vec<ColumnSpec> = self.columns.into_values().map(|r| r.spec).collect();
    columns.sort_by(|a, b| rank(a.role).cmp(&rank(b.role)).then_with(|| a.name.cmp(&b.name)));
    TableSpec {
      name: self.name,
      columns,
      parent_link: self.parent_link,
      shared: self.shared,
      comment: self.comment,
    }
  }
}

struct Builder<'o> {
  options:    &'o Options,
  normalizer: Normalizer,
  root:       String,
  order:      Vec<String>,
  tables:     BTreeMap<String, TableBuilder>,
  owners:     BTreeMap<String, String>,
  links:      Vec<LinkEdge>,
  link_keys:  BTreeSet<(String, String)>,
  path_index: BTreeMap<String, PathTarget>,
  extras:     Vec<ExtraSlot>,
}

fn relative_key(relative: &[String]) -> String { relative.join("/") }

fn pointer_suffix(relative: &[String]) -> String {
  relative.iter().map(|s| escape_pointer(s)).collect::<Vec<_>>().join("/")
}

impl<'o> Builder<'o> {
  fn new(options: &'o Options, normalizer: Normalizer) -> Self {
    let root = normalizer.normalize(&[options.root_table.as_str()]);
    Self {
      options,
      normalizer,
      root,
      order: Vec::new(),
      tables: BTreeMap::new(),
      owners: BTreeMap::new(),
      links: Vec::new(),
      link_keys: BTreeSet::new(),
      path_index: BTreeMap::new(),
      extras: Vec::new(),
    }
  }

  fn build(mut self, root: &ObjectNode) -> Result<TableModel> {
    let root_name = self.root.clone();
    let root_path = SchemaPath::root();
    let options = self.options;
    self.claim_table(&root_name, "/", false, root.comment.clone())?;
    for extra in &options.extra_columns {
      let name = self.normalizer.normalize(&[extra.name.as_str()]);
      self.extras.push(ExtraSlot {
        name:     extra.name.clone(),
        column:   name.clone(),
        sql_type: extra.sql_type,
      });
      let spec = ColumnSpec {
        name,
        sql_type: extra.sql_type,
        nullable: true,
        role: ColumnRole::Extra,
        comment: None,
      };
      let display = format!("<extra column {}>", extra.name);
      self.register(&root_name, spec, format!("extra:{}", extra.name), display)?;
    }
    self.path_index.insert(root_path.to_string(), PathTarget::Table { table: root_name.clone() });

    let plan = self.object(root, &root_name, &[], &root_path)?;

    let mut tables = Vec::with_capacity(self.order.len());
    let mut index = BTreeMap::new();
    for name in &self.order {
      if let Some(builder) = self.tables.remove(name) {
        index.insert(name.clone(), tables.len());
        tables.push(builder.finish());
      }
    }

    tracing::debug!(tables = tables.len(), links = self.links.len(), "compiled table model");

    Ok(TableModel {
      root: root_name,
      tables,
      index,
      links: self.links,
      path_index: self.path_index,
      plan,
      item_column: self.normalizer.normalize(&[options.item_col_name.as_str()]),
      item_type: options.item_col_type.sql_type(),
      prefix_column: self.normalizer.normalize(&[options.prefix_col_name.as_str()]),
      extras: self.extras,
    })
  }

  // ── Registration ──────────────────────────────────────────────────────────

  /// Reserve a table name for `owner`. Returns `false` if the same owner
  /// already created it.
  fn claim_table(
    &mut self,
    name: &str,
    owner: &str,
    shared: bool,
    comment: Option<String>,
  ) -> Result<bool> {
    if let Some(existing) = self.owners.get(name) {
      if existing == owner {
        return Ok(false);
      }
      return Err(Error::NamingCollision {
        table:      TABLES_SCOPE.to_owned(),
        identifier: name.to_owned(),
        first:      existing.clone(),
        second:     owner.to_owned(),
      });
    }
    self.owners.insert(name.to_owned(), owner.to_owned());
    self.order.push(name.to_owned());
    self.tables.insert(name.to_owned(), TableBuilder {
      name: name.to_owned(),
      columns: BTreeMap::new(),
      parent_link: None,
      shared,
      comment,
    });

    let item_column = self.normalizer.normalize(&[self.options.item_col_name.as_str()]);
    let prefix_column = self.normalizer.normalize(&[self.options.prefix_col_name.as_str()]);
    let structural = [
      (IDENTITY_COLUMN.to_owned(), SqlType::Integer, ColumnRole::Identity),
      (item_column, self.options.item_col_type.sql_type(), ColumnRole::ItemId),
      (prefix_column, SqlType::Text, ColumnRole::Prefix),
    ];
    for (column, sql_type, role) in structural {
      let key = format!("structural:{role:?}");
      let display = format!("<{role:?} column>");
      let spec = ColumnSpec {
        name: column,
        sql_type,
        nullable: false,
        role,
        comment: None,
      };
      self.register(name, spec, key, display)?;
    }
    Ok(true)
  }

  fn register(&mut self, table: &str, spec: ColumnSpec, key: String, display: String) -> Result<()> {
    let Some(builder) = self.tables.get_mut(table) else {
      return Err(Error::resolution(table, "column registered on an unknown table"));
    };
    match builder.columns.get(&spec.name) {
      Some(existing) if existing.key == key => Ok(()),
      Some(existing) => Err(Error::NamingCollision {
        table:      table.to_owned(),
        identifier: spec.name.clone(),
        first:      existing.display.clone(),
        second:     display,
      }),
      None => {
        builder.columns.insert(spec.name.clone(), Registered { spec, key, display });
        Ok(())
      }
    }
  }

  fn link(&mut self, table: &str, column: String, target: &str, rule: MatchRule, display: String) -> Result<()> {
    let key = format!("link:{target}:{rule:?}");
    let spec = ColumnSpec {
      name: column.clone(),
      sql_type: SqlType::Integer,
      nullable: true,
      role: ColumnRole::Link,
      comment: None,
    };
    self.register(table, spec, key, display)?;
    if self.link_keys.insert((table.to_owned(), column.clone())) {
      self.links.push(LinkEdge {
        table: table.to_owned(),
        column,
        target: target.to_owned(),
        rule,
      });
    }
    Ok(())
  }

  /// Give a newly created child table its back-reference to `parent`.
  fn back_reference(&mut self, table: &str, parent: &str) -> Result<()> {
    let column = self.normalizer.normalize_with_suffix(&[parent], "_id");
    let display = format!("<back-reference to {parent}>");
    self.link(table, column.clone(), parent, MatchRule::Ancestor, display)?;
    if let Some(builder) = self.tables.get_mut(table) {
      builder.parent_link = Some(ParentLink { column, parent_table: parent.to_owned() });
    }
    Ok(())
  }

  // ── Walk ──────────────────────────────────────────────────────────────────

  fn node(&mut self, node: &SchemaNode, table: &str, relative: &[String], path: &SchemaPath) -> Result<Plan> {
    match node {
      SchemaNode::Scalar(scalar) => self.column(table, relative, path, vec![scalar.clone()]),
      SchemaNode::Union(variants) => self.column(table, relative, path, variants.clone()),
      SchemaNode::InlineObject(object) => self.object(object, table, relative, path),
      SchemaNode::ChildTableObject(child) => {
        Ok(Plan::Table(self.shared_table(child, table, relative, path)?))
      }
      SchemaNode::PatternCollection(collection) => self.collection(collection, table, relative, path),
    }
  }

  fn object(&mut self, object: &ObjectNode, table: &str, relative: &[String], path: &SchemaPath) -> Result<Plan> {
    let mut children = Vec::with_capacity(object.children.len());
    for (name, child) in &object.children {
      let mut child_relative = relative.to_vec();
      child_relative.push(name.clone());
      children.push((name.clone(), self.node(child, table, &child_relative, &path.child(name))?));
    }
    let mut tables = Vec::with_capacity(object.attached.len());
    for attached in &object.attached {
      tables.push(self.shared_table(attached, table, relative, path)?);
    }
    Ok(Plan::Object { children, tables, path: path.clone() })
  }

  fn column(&mut self, table: &str, relative: &[String], path: &SchemaPath, variants: Vec<Scalar>) -> Result<Plan> {
    let column = self.normalizer.normalize(relative);
    let sql_type = SqlType::widen(&variants);
    let spec = ColumnSpec {
      name: column.clone(),
      sql_type,
      nullable: true,
      role: ColumnRole::Data,
      comment: variants.iter().find_map(|v| v.comment.clone()),
    };
    self.register(table, spec, format!("data:{}", relative_key(relative)), path.to_string())?;
    self.path_index.insert(path.to_string(), PathTarget::Column {
      table:  table.to_owned(),
      column: column.clone(),
    });
    Ok(Plan::Column { column, sql_type, variants, path: path.clone() })
  }

  fn shared_table(&mut self, child: &TableNode, parent: &str, relative: &[String], path: &SchemaPath) -> Result<TablePlan> {
    let name = self.normalizer.normalize(&[child.definition.as_str()]);
    let owner = format!("#/definitions/{}", child.definition);
    if self.claim_table(&name, &owner, child.is_shared, child.body.comment.clone())? {
      self.back_reference(&name, parent)?;
    }

    let column = if relative.is_empty() {
      self.normalizer.normalize_with_suffix(&[name.as_str()], "_id")
    } else {
      self.normalizer.normalize_with_suffix(relative, "_id")
    };
    let rule = MatchRule::Descendant { suffix: pointer_suffix(relative) };
    let display = format!("<link to {name} at {path}>");
    self.link(parent, column, &name, rule, display)?;

    self.path_index.insert(path.to_string(), PathTarget::Table { table: name.clone() });
    let body = self.object(Arc::as_ref(&child.body), &name, &[], path)?;
    Ok(TablePlan { table: name, body: Box::new(body), path: path.clone() })
  }

  fn collection(
    &mut self,
    collection: &CollectionNode,
    parent: &str,
    relative: &[String],
    path: &SchemaPath,
  ) -> Result<Plan> {
    let mut segments: Vec<String> = Vec::with_capacity(relative.len() + 1);
    if parent != self.root || relative.is_empty() {
      segments.push(parent.to_owned());
    }
    if relative.is_empty() {
      segments.push("entries".to_owned());
    }
    segments.extend(relative.iter().cloned());
    let name = self.normalizer.normalize(&segments);

    let owner = format!("{parent}/{}", relative_key(relative));
    if self.claim_table(&name, &owner, false, collection.comment.clone())? {
      self.back_reference(&name, parent)?;
    }
    self.path_index.insert(path.to_string(), PathTarget::Table { table: name.clone() });

    let value_path = path.child(ANY_KEY);
    let value = match collection.value.as_ref() {
      SchemaNode::Scalar(scalar) => {
        self.column(&name, &[VALUE_COLUMN.to_owned()], &value_path, vec![scalar.clone()])?
      }
      SchemaNode::Union(variants) => {
        self.column(&name, &[VALUE_COLUMN.to_owned()], &value_path, variants.clone())?
      }
      other => self.node(other, &name, &[], &value_path)?,
    };

    Ok(Plan::Collection {
      table: name,
      keys: collection.keys,
      value: Box::new(value),
      path: path.clone(),
    })
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::schema::{resolve, tests::loan_schema};

  fn loan_options() -> Options {
    Options::default().with_abbreviation("AbbreviateThisReallyLongColumn", "AbbTRLC")
  }

  fn loan_model() -> TableModel {
    TableModel::build(&resolve(&loan_schema()).unwrap(), &loan_options()).unwrap()
  }

  fn column_names(table: &TableSpec) -> Vec<&str> {
    table.columns.iter().map(|c| c.name.as_str()).collect()
  }

  #[test]
  fn loan_schema_tables_and_columns() {
    let model = loan_model();
    let names: Vec<_> = model.tables().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["root", "basic_address", "real_estate_owned"]);

    let root = model.table("root").unwrap();
    assert_eq!(column_names(root), [
      "id",
      "item_id",
      "prefix",
      "loan__abb_trlc",
      "loan__amount",
      "subject_property__acreage",
      "subject_property__address__latitude",
      "subject_property__address__longitude",
      "subject_property__address_id",
    ]);
    assert!(root.parent_link.is_none());

    let address = model.table("basic_address").unwrap();
    assert_eq!(column_names(address), ["id", "item_id", "prefix", "city", "zip_code", "root_id"]);
    assert!(address.shared);
    assert_eq!(address.parent_link.as_ref().unwrap().parent_table, "root");

    let reo = model.table("real_estate_owned").unwrap();
    assert_eq!(column_names(reo), [
      "id",
      "item_id",
      "prefix",
      "address__latitude",
      "address__longitude",
      "rental_income",
      "address_id",
      "root_id",
    ]);
  }

  #[test]
  fn loan_schema_links() {
    let model = loan_model();
    let links: Vec<_> = model
      .links()
      .iter()
      .map(|l| (l.table.as_str(), l.column.as_str(), l.target.as_str()))
      .collect();
    assert_eq!(links, [
      ("basic_address", "root_id", "root"),
      ("root", "subject_property__address_id", "basic_address"),
      ("real_estate_owned", "root_id", "root"),
      ("real_estate_owned", "address_id", "basic_address"),
    ]);
    assert_eq!(model.links()[1].rule, MatchRule::Descendant {
      suffix: "SubjectProperty/Address".to_owned(),
    });
    assert_eq!(model.links()[3].rule, MatchRule::Descendant { suffix: "Address".to_owned() });
    assert_eq!(model.links()[2].rule, MatchRule::Ancestor);
  }

  #[test]
  fn path_index_covers_columns_and_tables() {
    let model = loan_model();
    let index = model.path_index();
    assert_eq!(index["/RealEstateOwned/*/Address/City"], PathTarget::Column {
      table:  "basic_address".to_owned(),
      column: "city".to_owned(),
    });
    assert_eq!(index["/RealEstateOwned"], PathTarget::Table { table: "real_estate_owned".to_owned() });
    assert_eq!(index["/SubjectProperty/Address/Latitude"], PathTarget::Column {
      table:  "root".to_owned(),
      column: "subject_property__address__latitude".to_owned(),
    });
  }

  #[test]
  fn builds_are_deterministic() {
    assert_eq!(loan_model(), loan_model());
  }

  #[test]
  fn colliding_columns_fail() {
    let schema = json!({
      "type": "object",
      "properties": {
        "fooBar": { "type": "string" },
        "FooBar": { "type": "integer" }
      }
    });
    let err = TableModel::build(&resolve(&schema).unwrap(), &Options::default()).unwrap_err();
    match err {
      Error::NamingCollision { table, identifier, first, second } => {
        assert_eq!(table, "root");
        assert_eq!(identifier, "foo_bar");
        assert_eq!(first, "/fooBar");
        assert_eq!(second, "/FooBar");
      }
      other => panic!("unexpected {other}"),
    }
  }

  #[test]
  fn case_only_difference_collides_after_truncation() {
    let long = "x".repeat(80);
    let schema = json!({
      "type": "object",
      "properties": {
        "A": { "type": "object", "properties": { long.clone(): { "type": "string" } } },
        "a": { "type": "object", "properties": { long: { "type": "string" } } }
      }
    });
    let err = TableModel::build(&resolve(&schema).unwrap(), &Options::default()).unwrap_err();
    assert!(matches!(err, Error::NamingCollision { .. }), "{err}");
  }

  #[test]
  fn comments_are_carried_onto_tables() {
    let model = loan_model();
    assert_eq!(model.table("root").unwrap().comment.as_deref(), Some("the root of everything"));
    assert_eq!(model.table("basic_address").unwrap().comment, None);
  }

  #[test]
  fn data_column_cannot_shadow_structural_column() {
    let schema = json!({
      "type": "object",
      "properties": { "Prefix": { "type": "string" } }
    });
    let err = TableModel::build(&resolve(&schema).unwrap(), &Options::default()).unwrap_err();
    assert!(matches!(err, Error::NamingCollision { ref identifier, .. } if identifier == "prefix"));
  }

  #[test]
  fn scalar_collection_gets_value_column() {
    let schema = json!({
      "type": "object",
      "properties": {
        "Scores": { "type": "object", "additionalProperties": { "type": "number" } },
        "Union": { "oneOf": [{ "type": "integer" }, { "type": "string" }] }
      }
    });
    let model = TableModel::build(&resolve(&schema).unwrap(), &Options::default()).unwrap();
    let scores = model.table("scores").unwrap();
    assert_eq!(scores.column(VALUE_COLUMN).unwrap().sql_type, SqlType::Float);
    assert_eq!(model.table("root").unwrap().column("union").unwrap().sql_type, SqlType::Text);
  }

  #[test]
  fn extra_columns_land_on_root() {
    let mut options = Options::default();
    options.extra_columns.push(crate::config::ExtraColumn {
      name:     "loan_period".to_owned(),
      sql_type: SqlType::Integer,
    });
    let model = TableModel::build(&resolve(&loan_schema()).unwrap(), &options).unwrap();
    let column = model.table("root").unwrap().column("loan_period").unwrap();
    assert_eq!(column.role, ColumnRole::Extra);
  }
}
