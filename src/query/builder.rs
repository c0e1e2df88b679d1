//! Base query construction: request shape + context kind -> unfiltered query.
//!
//! `QueryGenerator` is the seam to the upstream generator. `ModelQueryGenerator`
//! translates request shapes against the entity model the way the API's
//! generator does: root entity aliased `E1`, navigation hops aliased `R1..Rn`,
//! key predicates before client filters, key ordering by default for lists.

use crate::error::BuildError;
use crate::model::{EntityDef, EntityModel, Value};
use crate::query::classify::ContextKind;
use crate::query::{
    FieldRef, GeneratedQuery, Join, OrderTerm, PagingHint, Predicate, SelectKind,
};
use crate::request::{OperationKind, RequestShape};
use tracing::debug;

pub const ROOT_ALIAS: &str = "E1";

/// Upstream query generator
pub trait QueryGenerator {
    /// Produce the unfiltered query for `shape` in context `kind`. `paging`
    /// requests server-side paging metadata; it never changes the query structure.
    fn generate(
        &self,
        shape: &RequestShape,
        kind: ContextKind,
        paging: Option<PagingHint>,
    ) -> Result<GeneratedQuery, BuildError>;
}

/// Generator driven by an `EntityModel`
#[derive(Debug, Clone, Default)]
pub struct ModelQueryGenerator {
    model: EntityModel,
}

impl ModelQueryGenerator {
    pub fn new(model: EntityModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &EntityModel {
        &self.model
    }

    fn entity(&self, name: &str) -> Result<&EntityDef, BuildError> {
        self.model
            .entity(name)
            .ok_or_else(|| BuildError::UnknownEntitySet(name.to_string()))
    }

    /// Validate client field references: unqualified ones must exist on the
    /// selected entity, qualified ones must name an alias in the query.
    fn check_fields<'a>(
        &self,
        refs: impl IntoIterator<Item = &'a FieldRef>,
        selected: &EntityDef,
        query: &GeneratedQuery,
    ) -> Result<(), BuildError> {
        for r in refs {
            let known = if r.is_qualified() {
                query.has_alias(&r.alias)
            } else {
                selected.has_field(&r.field)
            };
            if !known {
                return Err(BuildError::UnknownField {
                    entity: if r.is_qualified() {
                        r.alias.clone()
                    } else {
                        selected.name.clone()
                    },
                    field: r.field.clone(),
                });
            }
        }
        Ok(())
    }
}

impl QueryGenerator for ModelQueryGenerator {
    fn generate(
        &self,
        shape: &RequestShape,
        kind: ContextKind,
        paging: Option<PagingHint>,
    ) -> Result<GeneratedQuery, BuildError> {
        let root = self
            .model
            .by_entity_set(&shape.entity_path.entity_set)
            .ok_or_else(|| BuildError::UnknownEntitySet(shape.entity_path.entity_set.clone()))?;

        let mut query = GeneratedQuery::select(root.name.clone(), ROOT_ALIAS);
        let mut key_predicates: Vec<Predicate> = Vec::new();
        if let Some(key) = &shape.entity_path.key {
            key_predicates.push(Predicate::eq_value(
                FieldRef::new(ROOT_ALIAS, root.key_field.clone()),
                key.clone(),
            ));
        }

        let mut current_alias = ROOT_ALIAS.to_string();
        let mut current = root;
        let mut last_key: Option<&Value> = shape.entity_path.key.as_ref();
        for (i, segment) in shape.navigation.iter().enumerate() {
            let target = current.relation_target(&segment.relation).ok_or_else(|| {
                BuildError::UnknownRelation {
                    entity: current.name.clone(),
                    relation: segment.relation.clone(),
                }
            })?;
            let target = self.entity(target)?;
            let alias = format!("R{}", i + 1);
            query
                .joins
                .push(Join::new(current_alias.clone(), segment.relation.clone(), alias.clone()));
            if let Some(key) = &segment.key {
                key_predicates.push(Predicate::eq_value(
                    FieldRef::new(alias.clone(), target.key_field.clone()),
                    key.clone(),
                ));
            }
            last_key = segment.key.as_ref();
            current_alias = alias;
            current = target;
        }

        match (kind.operation(), last_key) {
            (OperationKind::Single, None) => return Err(BuildError::MissingKey(kind)),
            (OperationKind::List | OperationKind::Count, Some(_)) => {
                return Err(BuildError::UnexpectedKey(kind))
            }
            _ => {}
        }

        query.selection.alias = current_alias.clone();
        query.selection.entity = current.name.clone();
        query.selection.kind = match kind.operation() {
            OperationKind::Count => SelectKind::Count,
            _ => SelectKind::Entities,
        };

        let filter = match &shape.options.filter {
            Some(filter) => {
                self.check_fields(filter.field_refs(), current, &query)?;
                Some(filter.clone().qualify(&current_alias))
            }
            None => None,
        };
        query.where_predicate = key_predicates
            .into_iter()
            .chain(filter)
            .reduce(Predicate::and);

        if kind.operation() == OperationKind::List {
            if shape.options.order_by.is_empty() {
                query.order_by = Some(vec![OrderTerm::asc(FieldRef::new(
                    current_alias.clone(),
                    current.key_field.clone(),
                ))]);
            } else {
                self.check_fields(
                    shape.options.order_by.iter().map(|t| &t.field),
                    current,
                    &query,
                )?;
                query.order_by = Some(
                    shape
                        .options
                        .order_by
                        .iter()
                        .map(|t| OrderTerm {
                            field: if t.field.is_qualified() {
                                t.field.clone()
                            } else {
                                FieldRef::new(current_alias.clone(), t.field.field.clone())
                            },
                            direction: t.direction,
                        })
                        .collect(),
                );
            }
            query.top = shape.options.top;
            query.skip = shape.options.skip;
            query.paging = paging;
        }

        Ok(query)
    }
}

/// Builds the base query for a classified request, honoring the paging hint
pub struct BaseQueryBuilder<G: QueryGenerator = ModelQueryGenerator> {
    generator: G,
}

impl<G: QueryGenerator> BaseQueryBuilder<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Build the base query. Paging metadata is requested only for collection
    /// contexts with a non-zero `page_size_hint`.
    pub fn build(
        &self,
        shape: &RequestShape,
        kind: ContextKind,
        page_size_hint: usize,
    ) -> Result<GeneratedQuery, BuildError> {
        if kind.is_navigation() != shape.has_navigation() {
            return Err(BuildError::ContextMismatch(kind));
        }
        let paging = (page_size_hint > 0 && kind.supports_paging()).then_some(PagingHint {
            page_size: page_size_hint,
        });
        let query = self.generator.generate(shape, kind, paging)?;
        debug!(context = %kind, paged = paging.is_some(), "Base query generated");
        Ok(query)
    }
}

impl Default for BaseQueryBuilder<ModelQueryGenerator> {
    fn default() -> Self {
        Self::new(ModelQueryGenerator::default())
    }
}
