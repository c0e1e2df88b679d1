//! Query execution against a `ConversationStore`.
//!
//! The adapter only accepts `FilteredQuery`, which the security injector alone
//! can construct. Evaluation: expand the root entity, expand joins through
//! record links, apply the predicate with bound parameters, order, project the
//! selection alias, de-duplicate, then page.

use crate::error::ExecutionError;
use crate::model::{EntityDef, EntityModel, Value};
use crate::query::classify::ContextKind;
use crate::query::{Bindings, Direction, FilteredQuery, Operand, Predicate};
use crate::request::OperationKind;
use crate::store::{ConversationStore, EntityRecord};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Shaped result for one operation kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QueryResult {
    List {
        rows: Vec<EntityRecord>,
        /// Skip value for the next page when server paging truncated the result
        next_skip: Option<usize>,
    },
    Single(Option<EntityRecord>),
    Count(u64),
}

impl QueryResult {
    /// Empty result of the shape `kind` expects
    pub fn empty_for(kind: ContextKind) -> Self {
        match kind.operation() {
            OperationKind::List => QueryResult::List {
                rows: Vec::new(),
                next_skip: None,
            },
            OperationKind::Single => QueryResult::Single(None),
            OperationKind::Count => QueryResult::Count(0),
        }
    }

    /// Keys of returned entities, in result order
    pub fn keys(&self) -> Vec<Value> {
        match self {
            QueryResult::List { rows, .. } => rows.iter().map(|r| r.key.clone()).collect(),
            QueryResult::Single(Some(record)) => vec![record.key.clone()],
            QueryResult::Single(None) | QueryResult::Count(_) => Vec::new(),
        }
    }
}

/// Executes filtered queries
pub trait QueryExecutionAdapter {
    fn execute(
        &self,
        query: &FilteredQuery,
        kind: ContextKind,
    ) -> Result<QueryResult, ExecutionError>;
}

type Row = HashMap<String, EntityRecord>;

/// Evaluates filtered queries over a store using the entity model for joins
pub struct StoreExecutor {
    store: Arc<dyn ConversationStore>,
    model: EntityModel,
}

impl StoreExecutor {
    pub fn new(store: Arc<dyn ConversationStore>, model: EntityModel) -> Self {
        Self { store, model }
    }

    fn entity(&self, name: &str) -> Result<&EntityDef, ExecutionError> {
        self.model
            .entity(name)
            .ok_or_else(|| ExecutionError::UnknownEntity(name.to_string()))
    }

    fn expand(
        &self,
        query: &FilteredQuery,
    ) -> Result<(Vec<Row>, HashMap<String, &EntityDef>), ExecutionError> {
        let q = query.query();
        let mut aliases: HashMap<String, &EntityDef> = HashMap::new();
        let root = self.entity(&q.root_entity)?;
        aliases.insert(q.root_alias.clone(), root);

        let mut rows: Vec<Row> = self
            .store
            .scan(&root.name)?
            .into_iter()
            .map(|record| HashMap::from([(q.root_alias.clone(), record)]))
            .collect();

        for join in &q.joins {
            let source = *aliases
                .get(&join.source)
                .ok_or_else(|| ExecutionError::UnknownAlias(join.source.clone()))?;
            let target_name = source.relation_target(&join.relation).ok_or_else(|| {
                ExecutionError::UnknownEntity(format!("{}.{}", source.name, join.relation))
            })?;
            let target = self.entity(target_name)?;
            aliases.insert(join.alias.clone(), target);

            let mut cache: HashMap<Value, Option<EntityRecord>> = HashMap::new();
            let mut expanded = Vec::new();
            for row in rows {
                let linked = row
                    .get(&join.source)
                    .map(|r| r.linked(&join.relation).to_vec())
                    .unwrap_or_default();
                for key in linked {
                    let record = match cache.get(&key) {
                        Some(cached) => cached.clone(),
                        None => {
                            let fetched = self.store.get(&target.name, &key)?;
                            cache.insert(key.clone(), fetched.clone());
                            fetched
                        }
                    };
                    // Dangling links contribute no row
                    if let Some(record) = record {
                        let mut next = row.clone();
                        next.insert(join.alias.clone(), record);
                        expanded.push(next);
                    }
                }
            }
            rows = expanded;
        }
        Ok((rows, aliases))
    }
}

fn field_value(
    row: &Row,
    aliases: &HashMap<String, &EntityDef>,
    alias: &str,
    field: &str,
) -> Result<Value, ExecutionError> {
    let def = aliases
        .get(alias)
        .ok_or_else(|| ExecutionError::UnknownAlias(alias.to_string()))?;
    Ok(row
        .get(alias)
        .map(|record| record.field(field, &def.key_field))
        .unwrap_or(Value::Null))
}

fn evaluate(
    predicate: &Predicate,
    row: &Row,
    aliases: &HashMap<String, &EntityDef>,
    bindings: &Bindings,
) -> Result<bool, ExecutionError> {
    match predicate {
        Predicate::Compare { left, op, right } => {
            let lhs = field_value(row, aliases, &left.alias, &left.field)?;
            let rhs = match right {
                Operand::Param(name) => bindings
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ExecutionError::UnboundParameter(name.clone()))?,
                Operand::Literal(value) => value.clone(),
                Operand::Field(r) => field_value(row, aliases, &r.alias, &r.field)?,
            };
            // NULL never compares
            if lhs == Value::Null || rhs == Value::Null {
                return Ok(false);
            }
            Ok(op.holds(lhs.cmp(&rhs)))
        }
        Predicate::And(l, r) => {
            Ok(evaluate(l, row, aliases, bindings)? && evaluate(r, row, aliases, bindings)?)
        }
        Predicate::Or(l, r) => {
            Ok(evaluate(l, row, aliases, bindings)? || evaluate(r, row, aliases, bindings)?)
        }
        Predicate::Not(p) => Ok(!evaluate(p, row, aliases, bindings)?),
    }
}

impl StoreExecutor {
    /// Matching rows, ordered and projected onto the selection alias. One
    /// record per surviving join row, before de-duplication.
    fn project(&self, query: &FilteredQuery) -> Result<(usize, Vec<EntityRecord>), ExecutionError> {
        let q = query.query();
        let (rows, aliases) = self.expand(query)?;
        let expanded = rows.len();

        let mut matched = Vec::new();
        for row in rows {
            let keep = match &q.where_predicate {
                Some(pred) => evaluate(pred, &row, &aliases, query.bindings())?,
                None => true,
            };
            if keep {
                matched.push(row);
            }
        }

        if let Some(terms) = &q.order_by {
            let mut keyed = Vec::with_capacity(matched.len());
            for row in matched {
                let mut sort_key = Vec::with_capacity(terms.len());
                for term in terms {
                    sort_key.push(field_value(
                        &row,
                        &aliases,
                        &term.field.alias,
                        &term.field.field,
                    )?);
                }
                keyed.push((sort_key, row));
            }
            keyed.sort_by(|(a, _), (b, _)| {
                terms
                    .iter()
                    .zip(a.iter().zip(b.iter()))
                    .map(|(term, (x, y))| match term.direction {
                        Direction::Asc => x.cmp(y),
                        Direction::Desc => y.cmp(x),
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            matched = keyed.into_iter().map(|(_, row)| row).collect();
        }

        let selection = &q.selection.alias;
        let projected = matched
            .into_iter()
            .filter_map(|mut row| row.remove(selection))
            .collect();
        Ok((expanded, projected))
    }
}

impl QueryExecutionAdapter for StoreExecutor {
    fn execute(
        &self,
        query: &FilteredQuery,
        kind: ContextKind,
    ) -> Result<QueryResult, ExecutionError> {
        let q = query.query();
        let (expanded, mut projected) = self.project(query)?;
        if q.distinct {
            let mut seen = HashSet::new();
            projected.retain(|record| seen.insert(record.key.clone()));
        }

        debug!(
            context = %kind,
            expanded,
            returned = projected.len(),
            "Query executed"
        );

        Ok(match kind.operation() {
            OperationKind::Count => QueryResult::Count(projected.len() as u64),
            OperationKind::Single => match projected.len() {
                0 => QueryResult::Single(None),
                1 => QueryResult::Single(projected.pop()),
                n => return Err(ExecutionError::AmbiguousSingle(n)),
            },
            OperationKind::List => {
                let skip = q.skip.unwrap_or(0);
                let mut rows: Vec<EntityRecord> = projected.into_iter().skip(skip).collect();
                if let Some(top) = q.top {
                    rows.truncate(top);
                }
                let mut next_skip = None;
                if let Some(paging) = q.paging {
                    if rows.len() > paging.page_size {
                        rows.truncate(paging.page_size);
                        next_skip = Some(skip + paging.page_size);
                    }
                }
                QueryResult::List { rows, next_skip }
            }
        })
    }
}
