//! The post-load link pass.
//!
//! For each [`LinkEdge`] of the model, in order:
//!   1. count holder rows matching more than one target row; if any, the
//!      edge is reported as a [`LinkIntegrityError`] and left unlinked,
//!   2. set the link column with one `UPDATE .. FROM` over the whole table,
//!   3. add the foreign key (or, where the dialect cannot alter constraints,
//!      verify that no link value is orphaned).
//!
//! Every step recomputes from the stored rows, so the pass can be re-run.

use crate::{
  Error, Result,
  dialect::{Dialect, string_literal},
  error::{LinkIntegrityError, Phase},
  model::{IDENTITY_COLUMN, LinkEdge, MatchRule, TableModel},
  store::Store,
};

const HOLDER: &str = "h";
const TARGET: &str = "t";

/// Statements issued for one edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeStatements {
  pub ambiguity:    String,
  pub update:       String,
  pub constraints:  Vec<String>,
  pub orphan_check: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
  pub linked:           usize,
  pub updated_rows:     u64,
  pub integrity_errors: Vec<LinkIntegrityError>,
}

pub struct Linker<'m> {
  model:     &'m TableModel,
  dialect:   Dialect,
  namespace: Option<&'m str>,
}

impl<'m> Linker<'m> {
  pub fn new(model: &'m TableModel, dialect: Dialect, namespace: Option<&'m str>) -> Self {
    Self { model, dialect, namespace }
  }

  fn table(&self, name: &str) -> String { self.dialect.table_name(self.namespace, name) }

  fn join_condition(&self, edge: &LinkEdge) -> String {
    let q = |alias: &str, column: &str| format!("{alias}.{}", self.dialect.quote(column));
    let item = self.model.item_column();
    let prefix = self.model.prefix_column();
    let same_item = format!("{} = {}", q(TARGET, item), q(HOLDER, item));
    let placement = match &edge.rule {
      MatchRule::Descendant { suffix } if suffix.is_empty() => {
        format!("{} = {}", q(TARGET, prefix), q(HOLDER, prefix))
      }
      MatchRule::Descendant { suffix } => format!(
        "{} = {} || {}",
        q(TARGET, prefix),
        q(HOLDER, prefix),
        string_literal(&format!("/{suffix}"))
      ),
      MatchRule::Ancestor => format!(
        "({t} = {h} or substr({h}, 1, length({t}) + 1) = {t} || '/')",
        h = q(HOLDER, prefix),
        t = q(TARGET, prefix)
      ),
    };
    format!("{same_item} and {placement}")
  }

  /// Render the statements for `edge`.
  pub fn statements(&self, edge: &LinkEdge) -> EdgeStatements {
    let holder = self.table(&edge.table);
    let target = self.table(&edge.target);
    let id = self.dialect.quote(IDENTITY_COLUMN);
    let column = self.dialect.quote(&edge.column);
    let condition = self.join_condition(edge);

    let ambiguity = format!(
      "select count(*) from (select {HOLDER}.{id} from {holder} as {HOLDER} join {target} as {TARGET} on \
       {condition} group by {HOLDER}.{id} having count(*) > 1) as ambiguous"
    );
    let update = format!(
      "update {holder} as {HOLDER} set {column} = {TARGET}.{id} from {target} as {TARGET} where {condition}"
    );

    let constraint = self.dialect.quote(&format!("fk_{}", edge.column));
    let mut constraints = Vec::new();
    let mut orphan_check = None;
    if self.dialect.supports_add_constraint() {
      if self.dialect.supports_drop_constraint_if_exists() {
        constraints.push(format!("alter table {holder} drop constraint if exists {constraint}"));
      }
      constraints.push(format!(
        "alter table {holder} add constraint {constraint} foreign key ({column}) references {target} ({id})"
      ));
    } else {
      orphan_check = Some(format!(
        "select count(*) from {holder} as {HOLDER} where {HOLDER}.{column} is not null and not exists \
         (select 1 from {target} as {TARGET} where {TARGET}.{id} = {HOLDER}.{column})"
      ));
    }

    EdgeStatements { ambiguity, update, constraints, orphan_check }
  }

  /// Resolve every edge of the model against `store`.
  pub async fn link<S: Store>(&self, store: &S) -> Result<LinkReport> {
    let mut report = LinkReport::default();

    for edge in self.model.links() {
      let statements = self.statements(edge);

      let ambiguous_rows = store
        .query_count(statements.ambiguity)
        .await
        .map_err(Error::store(Phase::Link))?;
      if ambiguous_rows > 0 {
        let error = LinkIntegrityError {
          table: edge.table.clone(),
          column: edge.column.clone(),
          target: edge.target.clone(),
          ambiguous_rows,
        };
        tracing::warn!(%error, "leaving link unresolved");
        report.integrity_errors.push(error);
        continue;
      }

      let updated = store
        .execute(statements.update)
        .await
        .map_err(Error::store(Phase::Link))?;

      for sql in statements.constraints {
        tracing::debug!(%sql, "adding constraint");
        store.execute(sql).await.map_err(Error::store(Phase::Link))?;
      }
      if let Some(sql) = statements.orphan_check {
        let count = store.query_count(sql).await.map_err(Error::store(Phase::Link))?;
        if count > 0 {
          return Err(Error::ConstraintViolation {
            table: edge.table.clone(),
            column: edge.column.clone(),
            count,
          });
        }
      }

      tracing::debug!(table = %edge.table, column = %edge.column, updated, "linked");
      report.linked += 1;
      report.updated_rows += updated;
    }

    tracing::info!(
      linked = report.linked,
      rows = report.updated_rows,
      unresolved = report.integrity_errors.len(),
      "created links"
    );
    Ok(report)
  }
}
