//! Schema resolution: a JSON Schema document (with `$ref`s, `allOf`
//! composition, pattern-keyed maps and arrays) → a reference-free
//! [`SchemaNode`] tree.
//!
//! Resolution runs in two passes:
//!   1. `expand()` follows every `$ref` (bounded by [`MAX_REF_DEPTH`]) and
//!      records, for each object definition, every schema location it is
//!      reached from.
//!   2. `classify()` turns the expanded tree into [`SchemaNode`]s. Object
//!      definitions reached from more than one location become shared
//!      [`TableNode`]s, built once; `allOf` members are merged.

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
  sync::Arc,
};

use serde_json::{Map, Value};

use crate::{Error, Result};

/// Deepest chain of nested `$ref` hops followed before resolution gives up.
pub const MAX_REF_DEPTH: usize = 32;

/// Path segment standing in for arbitrary collection keys.
pub const ANY_KEY: &str = "*";

// ─── Paths ───────────────────────────────────────────────────────────────────

/// A location in the schema, e.g. `/RealEstateOwned/*/Address`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaPath(Vec<String>);

impl SchemaPath {
  pub fn root() -> Self { Self::default() }

  pub fn child(&self, segment: impl Into<String>) -> Self {
    let mut segments = self.0.clone();
    segments.push(segment.into());
    Self(segments)
  }

  pub fn segments(&self) -> &[String] { &self.0 }
}

impl fmt::Display for SchemaPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_empty() {
      return f.write_str("/");
    }
    for segment in &self.0 {
      write!(f, "/{segment}")?;
    }
    Ok(())
  }
}

// ─── Resolved nodes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
  String,
  Integer,
  Number,
  Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
  DateTime,
  Date,
}

/// A leaf value description.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
  pub primitive:   Primitive,
  pub format:      Option<Format>,
  /// Allowed values, when the schema declares an `enum`.
  pub enumeration: Option<Vec<Value>>,
  /// Array of scalars, stored as one text-array column.
  pub array:       bool,
  pub comment:     Option<String>,
}

impl Scalar {
  fn new(primitive: Primitive) -> Self {
    Self {
      primitive,
      format: None,
      enumeration: None,
      array: false,
      comment: None,
    }
  }
}

/// An object whose fields are flattened into the enclosing table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectNode {
  pub children: Vec<(String, SchemaNode)>,
  /// Shared tables anchored at this same location (from `allOf` members).
  pub attached: Vec<TableNode>,
  pub comment:  Option<String>,
}

/// An object promoted to its own table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableNode {
  pub definition: String,
  pub body:       Arc<ObjectNode>,
  pub is_shared:  bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKeys {
  /// `patternProperties` / `additionalProperties`: arbitrary string keys.
  Pattern,
  /// Array of objects: keys are indices.
  Index,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionNode {
  pub value:   Box<SchemaNode>,
  pub keys:    CollectionKeys,
  pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
  Scalar(Scalar),
  InlineObject(ObjectNode),
  ChildTableObject(TableNode),
  PatternCollection(CollectionNode),
  /// Scalar-only `oneOf`/`anyOf`.
  Union(Vec<Scalar>),
}

/// The output of [`Resolver::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
  pub root:   ObjectNode,
  /// Shared definitions promoted to tables, in first-encounter order.
  pub shared: Vec<String>,
}

// ─── Expanded (pass 1) representation ────────────────────────────────────────

enum Expanded {
  Scalar(Scalar),
  Object {
    properties: Vec<(String, Expanded)>,
    definition: Option<String>,
    comment:    Option<String>,
  },
  Collection {
    value:   Box<Expanded>,
    keys:    CollectionKeys,
    comment: Option<String>,
  },
  AllOf(Vec<Expanded>, SchemaPath),
  Union(Vec<Expanded>, SchemaPath),
  Nothing,
}

const STRUCTURAL_KEYS: &[&str] = &[
  "type",
  "$ref",
  "allOf",
  "oneOf",
  "anyOf",
  "enum",
  "properties",
  "patternProperties",
  "additionalProperties",
  "items",
];

fn comment_of(schema: &Map<String, Value>) -> Option<String> {
  schema
    .get("comment")
    .or_else(|| schema.get("description"))
    .and_then(Value::as_str)
    .map(str::to_owned)
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Resolves a schema document into [`SchemaNode`]s.
pub struct Resolver<'a> {
  document:    &'a Value,
  definitions: Option<&'a Map<String, Value>>,
  /// Definition name → every location it was expanded at.
  locations:   BTreeMap<String, BTreeSet<SchemaPath>>,
  encounter:   Vec<String>,
  built:       BTreeMap<String, Arc<ObjectNode>>,
}

impl<'a> Resolver<'a> {
  pub fn new(document: &'a Value) -> Self {
    Self {
      document,
      definitions: None,
      locations: BTreeMap::new(),
      encounter: Vec::new(),
      built: BTreeMap::new(),
    }
  }

  /// Resolve `$ref`s not found in the document against an external table of
  /// definitions, keyed by definition name.
  pub fn with_definitions(mut self, definitions: &'a Map<String, Value>) -> Self {
    self.definitions = Some(definitions);
    self
  }

  pub fn resolve(mut self) -> Result<ResolvedSchema> {
    let root_path = SchemaPath::root();
    let expanded = self.expand(self.document, &root_path, 0, None)?;

    let root = match self.classify(expanded, &root_path)? {
      Some(SchemaNode::InlineObject(object)) => object,
      Some(SchemaNode::ChildTableObject(table)) => (*table.body).clone(),
      _ => return Err(Error::resolution(&root_path, "root schema must be an object with properties")),
    };

    let shared = self
      .encounter
      .iter()
      .filter(|name| self.built.contains_key(*name))
      .cloned()
      .collect();

    Ok(ResolvedSchema { root, shared })
  }

  fn lookup(&self, reference: &str, path: &SchemaPath) -> Result<(&'a Value, String)> {
    let pointer = reference.strip_prefix('#').ok_or_else(|| {
      Error::resolution(path, format!("only local references are supported: {reference}"))
    })?;
    let name = pointer.rsplit('/').next().unwrap_or_default().to_owned();

    if let Some(target) = self.document.pointer(pointer) {
      return Ok((target, name));
    }
    self
      .definitions
      .and_then(|defs| defs.get(&name))
      .map(|target| (target, name))
      .ok_or_else(|| Error::resolution(path, format!("unresolved reference {reference}")))
  }

  fn expand(
    &mut self,
    schema: &'a Value,
    path: &SchemaPath,
    depth: usize,
    definition: Option<String>,
  ) -> Result<Expanded> {
    let Some(obj) = schema.as_object() else {
      return Err(Error::resolution(path, "schema is not an object"));
    };

    if let Some(reference) = obj.get("$ref") {
      let reference = reference
        .as_str()
        .ok_or_else(|| Error::resolution(path, "$ref must be a string"))?;
      if depth >= MAX_REF_DEPTH {
        return Err(Error::resolution(
          path,
          format!("reference depth exceeds {MAX_REF_DEPTH} at {reference} (cyclic definition?)"),
        ));
      }
      let (target, name) = self.lookup(reference, path)?;
      return self.expand(target, path, depth + 1, Some(name));
    }

    if let Some(members) = obj.get("allOf") {
      let members = self.expand_members(members, path, depth, true)?;
      return Ok(Expanded::AllOf(members, path.clone()));
    }
    for key in ["oneOf", "anyOf"] {
      if let Some(members) = obj.get(key) {
        let members = self.expand_members(members, path, depth, false)?;
        return Ok(Expanded::Union(members, path.clone()));
      }
    }

    let comment = comment_of(obj);

    if let Some(values) = obj.get("enum") {
      let values = values
        .as_array()
        .ok_or_else(|| Error::resolution(path, "enum must be an array"))?;
      let mut scalar = Scalar::new(Primitive::String);
      scalar.enumeration = Some(values.clone());
      scalar.comment = comment;
      return Ok(Expanded::Scalar(scalar));
    }

    let type_name = match obj.get("type") {
      Some(Value::String(t)) => t.as_str(),
      Some(Value::Array(types)) => {
        let non_null: Vec<&str> = types
          .iter()
          .filter_map(Value::as_str)
          .filter(|t| *t != "null")
          .collect();
        match non_null.as_slice() {
          [] => "null",
          [single] => *single,
          _ => {
            let members = non_null
              .iter()
              .map(|t| self.expand_typed(obj, t, path, depth, None, None))
              .collect::<Result<Vec<_>>>()?;
            return Ok(Expanded::Union(members, path.clone()));
          }
        }
      }
      Some(_) => return Err(Error::resolution(path, "type must be a string or an array")),
      None if obj.contains_key("properties")
        || obj.contains_key("patternProperties")
        || obj.contains_key("additionalProperties") =>
      {
        "object"
      }
      None if obj.contains_key("items") => "array",
      None => return Err(Error::resolution(path, "type information missing")),
    };

    self.expand_typed(obj, type_name, path, depth, definition, comment)
  }

  fn expand_members(
    &mut self,
    members: &'a Value,
    path: &SchemaPath,
    depth: usize,
    skip_annotations: bool,
  ) -> Result<Vec<Expanded>> {
    let members = members
      .as_array()
      .ok_or_else(|| Error::resolution(path, "composition keyword must hold an array"))?;
    let mut out = Vec::with_capacity(members.len());
    for member in members {
      let annotation_only = member
        .as_object()
        .is_some_and(|m| !STRUCTURAL_KEYS.iter().any(|k| m.contains_key(*k)));
      if skip_annotations && annotation_only {
        continue;
      }
      out.push(self.expand(member, path, depth, None)?);
    }
    Ok(out)
  }

  fn expand_typed(
    &mut self,
    obj: &'a Map<String, Value>,
    type_name: &str,
    path: &SchemaPath,
    depth: usize,
    definition: Option<String>,
    comment: Option<String>,
  ) -> Result<Expanded> {
    let primitive = match type_name {
      "object" => return self.expand_object(obj, path, depth, definition, comment),
      "array" => return self.expand_array(obj, path, depth, comment),
      "null" => {
        tracing::warn!(%path, "ignoring null-typed property");
        return Ok(Expanded::Nothing);
      }
      "string" => Primitive::String,
      "integer" => Primitive::Integer,
      "number" => Primitive::Number,
      "boolean" => Primitive::Boolean,
      other => return Err(Error::resolution(path, format!("unsupported type {other:?}"))),
    };

    let mut scalar = Scalar::new(primitive);
    scalar.comment = comment;
    scalar.format = match (obj.get("format").and_then(Value::as_str), definition.as_deref()) {
      (Some("date-time"), _) | (_, Some("timestamp")) => Some(Format::DateTime),
      (Some("date"), _) | (_, Some("date")) => Some(Format::Date),
      _ => None,
    };
    Ok(Expanded::Scalar(scalar))
  }

  fn expand_object(
    &mut self,
    obj: &'a Map<String, Value>,
    path: &SchemaPath,
    depth: usize,
    definition: Option<String>,
    comment: Option<String>,
  ) -> Result<Expanded> {
    let pattern = obj.get("patternProperties").and_then(Value::as_object);

    if let Some(value_schema) = pattern.and_then(|p| p.values().next()) {
      if pattern.is_some_and(|p| p.len() > 1) || obj.contains_key("properties") {
        tracing::warn!(%path, "only the first patternProperties entry is used");
      }
      let value = self.expand(value_schema, &path.child(ANY_KEY), depth, None)?;
      return Ok(Expanded::Collection {
        value: Box::new(value),
        keys: CollectionKeys::Pattern,
        comment,
      });
    }

    if let Some(properties) = obj.get("properties") {
      let properties = properties
        .as_object()
        .ok_or_else(|| Error::resolution(path, "properties must be an object"))?;

      if let Some(name) = &definition {
        if !self.locations.contains_key(name) {
          self.encounter.push(name.clone());
        }
        self.locations.entry(name.clone()).or_default().insert(path.clone());
      }

      let mut expanded = Vec::with_capacity(properties.len());
      for (name, schema) in properties {
        expanded.push((name.clone(), self.expand(schema, &path.child(name), depth, None)?));
      }
      return Ok(Expanded::Object { properties: expanded, definition, comment });
    }

    if let Some(additional) = obj.get("additionalProperties").filter(|a| a.is_object()) {
      let value = self.expand(additional, &path.child(ANY_KEY), depth, None)?;
      return Ok(Expanded::Collection {
        value: Box::new(value),
        keys: CollectionKeys::Pattern,
        comment,
      });
    }

    tracing::warn!(%path, "object with neither properties nor patternProperties");
    Ok(Expanded::Nothing)
  }

  fn expand_array(
    &mut self,
    obj: &'a Map<String, Value>,
    path: &SchemaPath,
    depth: usize,
    comment: Option<String>,
  ) -> Result<Expanded> {
    let Some(items) = obj.get("items") else {
      let mut scalar = Scalar::new(Primitive::String);
      scalar.array = true;
      scalar.comment = comment;
      return Ok(Expanded::Scalar(scalar));
    };

    match self.expand(items, &path.child(ANY_KEY), depth, None)? {
      Expanded::Scalar(mut scalar) => {
        scalar.array = true;
        scalar.comment = comment.or(scalar.comment);
        Ok(Expanded::Scalar(scalar))
      }
      Expanded::Union(..) => {
        let mut scalar = Scalar::new(Primitive::String);
        scalar.array = true;
        scalar.comment = comment;
        Ok(Expanded::Scalar(scalar))
      }
      Expanded::Nothing => Ok(Expanded::Nothing),
      value => Ok(Expanded::Collection {
        value: Box::new(value),
        keys: CollectionKeys::Index,
        comment,
      }),
    }
  }

  // ── Pass 2 ────────────────────────────────────────────────────────────────

  fn is_shared(&self, definition: &str) -> bool {
    self.locations.get(definition).is_some_and(|l| l.len() > 1)
  }

  fn classify(&mut self, expanded: Expanded, path: &SchemaPath) -> Result<Option<SchemaNode>> {
    let node = match expanded {
      Expanded::Nothing => return Ok(None),
      Expanded::Scalar(scalar) => SchemaNode::Scalar(scalar),
      Expanded::Object { properties, definition, comment } => {
        match definition.filter(|d| self.is_shared(d)) {
          Some(name) => {
            let body = match self.built.get(&name).cloned() {
              Some(body) => body,
              None => {
                let body = Arc::new(self.classify_object(properties, comment, path)?);
                self.built.insert(name.clone(), body.clone());
                body
              }
            };
            SchemaNode::ChildTableObject(TableNode {
              definition: name,
              body,
              is_shared: true,
            })
          }
          None => SchemaNode::InlineObject(self.classify_object(properties, comment, path)?),
        }
      }
      Expanded::Collection { value, keys, comment } => {
        let value_path = path.child(ANY_KEY);
        let Some(value) = self.classify(*value, &value_path)? else {
          tracing::warn!(%path, "collection values carry no columns; ignoring");
          return Ok(None);
        };
        SchemaNode::PatternCollection(CollectionNode {
          value: Box::new(value),
          keys,
          comment,
        })
      }
      Expanded::Union(members, at) => {
        let mut variants = Vec::new();
        for member in members {
          match self.classify(member, &at)? {
            None => {}
            Some(SchemaNode::Scalar(scalar)) => variants.push(scalar),
            Some(SchemaNode::Union(nested)) => variants.extend(nested),
            Some(_) => return Err(Error::resolution(&at, "object-valued unions are unsupported")),
          }
        }
        match variants.len() {
          0 => return Ok(None),
          1 => SchemaNode::Scalar(variants.remove(0)),
          _ => SchemaNode::Union(variants),
        }
      }
      Expanded::AllOf(members, at) => return self.merge_all_of(members, &at),
    };
    Ok(Some(node))
  }

  fn classify_object(
    &mut self,
    properties: Vec<(String, Expanded)>,
    comment: Option<String>,
    path: &SchemaPath,
  ) -> Result<ObjectNode> {
    let mut object = ObjectNode { comment, ..Default::default() };
    for (name, expanded) in properties {
      if let Some(node) = self.classify(expanded, &path.child(&name))? {
        object.children.push((name, node));
      }
    }
    Ok(object)
  }

  fn merge_all_of(&mut self, members: Vec<Expanded>, path: &SchemaPath) -> Result<Option<SchemaNode>> {
    let mut merged = ObjectNode::default();
    let mut scalars = Vec::new();

    for member in members {
      match self.classify(member, path)? {
        None => {}
        Some(SchemaNode::ChildTableObject(table)) => merged.attached.push(table),
        Some(SchemaNode::InlineObject(object)) => {
          for (name, node) in object.children {
            if merged.children.iter().any(|(existing, _)| *existing == name) {
              return Err(Error::resolution(
                path,
                format!("allOf members both declare property {name:?}"),
              ));
            }
            merged.children.push((name, node));
          }
          merged.attached.extend(object.attached);
          merged.comment = merged.comment.or(object.comment);
        }
        Some(node @ (SchemaNode::Scalar(_) | SchemaNode::Union(_))) => scalars.push(node),
        Some(SchemaNode::PatternCollection(_)) => {
          return Err(Error::resolution(path, "pattern collections cannot be merged with allOf"));
        }
      }
    }

    let has_object = !merged.children.is_empty() || !merged.attached.is_empty();
    match (has_object, scalars.is_empty()) {
      (true, false) => Err(Error::resolution(path, "allOf mixes objects and scalars")),
      (true, true) => Ok(Some(SchemaNode::InlineObject(merged))),
      (false, _) => Ok(scalars.into_iter().next()),
    }
  }
}

/// Resolve `document` with default settings.
pub fn resolve(document: &Value) -> Result<ResolvedSchema> {
  Resolver::new(document).resolve()
}
