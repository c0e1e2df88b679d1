//! Structured query representation.
//!
//! The upstream generator produces a `GeneratedQuery`; the security rewrite
//! transforms it as a tree (append join, wrap predicate, set distinct) and
//! never touches query text. `Display` renders a JPQL-like form for logs.

pub mod builder;
pub mod classify;
pub mod inject;

pub use builder::{BaseQueryBuilder, ModelQueryGenerator, QueryGenerator};
pub use classify::{classify, classify_request, ContextKind};
pub use inject::{Bindings, FilteredQuery, MembershipPolicy, SecurityPredicateInjector};

use crate::model::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// `alias.field`; an empty alias means "the selected entity" until the generator qualifies it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub alias: String,
    pub field: String,
}

impl FieldRef {
    pub fn new(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            field: field.into(),
        }
    }

    /// Field of the selected entity, qualified later by the generator
    pub fn unqualified(field: impl Into<String>) -> Self {
        Self::new("", field)
    }

    pub fn is_qualified(&self) -> bool {
        !self.alias.is_empty()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_qualified() {
            write!(f, "{}.{}", self.alias, self.field)
        } else {
            write!(f, "{}", self.field)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::Ne => ordering != Equal,
            CompareOp::Lt => ordering == Less,
            CompareOp::Le => ordering != Greater,
            CompareOp::Gt => ordering == Greater,
            CompareOp::Ge => ordering != Less,
        }
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Named bind parameter, rendered `:name`
    Param(String),
    Literal(Value),
    Field(FieldRef),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Param(name) => write!(f, ":{}", name),
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::Field(r) => write!(f, "{}", r),
        }
    }
}

/// Boolean predicate tree. `And` keeps operand order: left is evaluated and rendered first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Compare {
        left: FieldRef,
        op: CompareOp,
        right: Operand,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(left: FieldRef, op: CompareOp, right: Operand) -> Self {
        Predicate::Compare { left, op, right }
    }

    /// `left = :param`
    pub fn eq_param(left: FieldRef, param: impl Into<String>) -> Self {
        Self::compare(left, CompareOp::Eq, Operand::Param(param.into()))
    }

    /// `left = literal`
    pub fn eq_value(left: FieldRef, value: impl Into<Value>) -> Self {
        Self::compare(left, CompareOp::Eq, Operand::Literal(value.into()))
    }

    pub fn and(left: Predicate, right: Predicate) -> Self {
        Predicate::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Predicate, right: Predicate) -> Self {
        Predicate::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// Conjoin with an optional existing predicate, `self` first.
    pub fn and_then(self, rest: Option<Predicate>) -> Self {
        match rest {
            Some(rest) => Predicate::and(self, rest),
            None => self,
        }
    }

    /// Bind unqualified field references to `alias`.
    pub fn qualify(self, alias: &str) -> Self {
        let fix = |r: FieldRef| {
            if r.is_qualified() {
                r
            } else {
                FieldRef::new(alias, r.field)
            }
        };
        match self {
            Predicate::Compare { left, op, right } => Predicate::Compare {
                left: fix(left),
                op,
                right: match right {
                    Operand::Field(r) => Operand::Field(fix(r)),
                    other => other,
                },
            },
            Predicate::And(l, r) => Predicate::and(l.qualify(alias), r.qualify(alias)),
            Predicate::Or(l, r) => Predicate::or(l.qualify(alias), r.qualify(alias)),
            Predicate::Not(p) => Predicate::not(p.qualify(alias)),
        }
    }

    /// All field references in evaluation order
    pub fn field_refs(&self) -> Vec<&FieldRef> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a FieldRef>) {
        match self {
            Predicate::Compare { left, right, .. } => {
                out.push(left);
                if let Operand::Field(r) = right {
                    out.push(r);
                }
            }
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_refs(out);
                r.collect_refs(out);
            }
            Predicate::Not(p) => p.collect_refs(out),
        }
    }

    /// Parameter names referenced by the predicate
    pub fn params(&self) -> Vec<&str> {
        match self {
            Predicate::Compare {
                right: Operand::Param(name),
                ..
            } => vec![name.as_str()],
            Predicate::Compare { .. } => vec![],
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                let mut out = l.params();
                out.extend(r.params());
                out
            }
            Predicate::Not(p) => p.params(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { left, op, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Predicate::And(l, r) => {
                for (i, side) in [l, r].into_iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    match side.as_ref() {
                        Predicate::Or(..) => write!(f, "({})", side)?,
                        _ => write!(f, "{}", side)?,
                    }
                }
                Ok(())
            }
            Predicate::Or(l, r) => write!(f, "{} OR {}", l, r),
            Predicate::Not(p) => write!(f, "NOT ({})", p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub field: FieldRef,
    #[serde(default)]
    pub direction: Direction,
}

impl OrderTerm {
    pub fn asc(field: FieldRef) -> Self {
        Self {
            field,
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: FieldRef) -> Self {
        Self {
            field,
            direction: Direction::Desc,
        }
    }
}

impl fmt::Display for OrderTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Asc => write!(f, "{}", self.field),
            Direction::Desc => write!(f, "{} DESC", self.field),
        }
    }
}

/// Relation traversal: `JOIN source.relation alias`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub source: String,
    pub relation: String,
    pub alias: String,
}

impl Join {
    pub fn new(
        source: impl Into<String>,
        relation: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            relation: relation.into(),
            alias: alias.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectKind {
    Entities,
    Count,
}

/// Which alias's rows the query returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub alias: String,
    pub entity: String,
    pub kind: SelectKind,
}

/// Server-side paging request; does not alter the query structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingHint {
    pub page_size: usize,
}

/// Generated query as produced by the upstream generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub root_entity: String,
    pub root_alias: String,
    pub selection: Selection,
    pub distinct: bool,
    pub joins: Vec<Join>,
    pub where_predicate: Option<Predicate>,
    pub order_by: Option<Vec<OrderTerm>>,
    pub paging: Option<PagingHint>,
    pub top: Option<usize>,
    pub skip: Option<usize>,
}

impl GeneratedQuery {
    /// `SELECT alias FROM entity alias`
    pub fn select(entity: impl Into<String>, alias: impl Into<String>) -> Self {
        let entity = entity.into();
        let alias = alias.into();
        Self {
            root_entity: entity.clone(),
            root_alias: alias.clone(),
            selection: Selection {
                alias,
                entity,
                kind: SelectKind::Entities,
            },
            distinct: false,
            joins: Vec::new(),
            where_predicate: None,
            order_by: None,
            paging: None,
            top: None,
            skip: None,
        }
    }

    /// Root alias followed by join aliases, in declaration order
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.root_alias.as_str()).chain(self.joins.iter().map(|j| j.alias.as_str()))
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases().any(|a| a == alias)
    }

    /// Check the alias invariants: non-empty root, unique aliases, joins and
    /// clauses only reference aliases already introduced.
    pub fn check_structure(&self) -> Result<(), String> {
        if self.root_alias.is_empty() {
            return Err("missing root alias".to_string());
        }
        if self.root_entity.is_empty() {
            return Err("missing root entity".to_string());
        }
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(self.root_alias.as_str());
        for join in &self.joins {
            if !seen.contains(join.source.as_str()) {
                return Err(format!(
                    "join '{}' traverses from undeclared alias '{}'",
                    join.alias, join.source
                ));
            }
            if join.alias.is_empty() || !seen.insert(join.alias.as_str()) {
                return Err(format!("duplicate or empty join alias '{}'", join.alias));
            }
        }
        if !seen.contains(self.selection.alias.as_str()) {
            return Err(format!(
                "selection references undeclared alias '{}'",
                self.selection.alias
            ));
        }
        if let Some(pred) = &self.where_predicate {
            for r in pred.field_refs() {
                if !seen.contains(r.alias.as_str()) {
                    return Err(format!("predicate references undeclared alias in '{}'", r));
                }
            }
        }
        for term in self.order_by.iter().flatten() {
            if !seen.contains(term.field.alias.as_str()) {
                return Err(format!(
                    "order term references undeclared alias in '{}'",
                    term.field
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for GeneratedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        match (self.selection.kind, self.distinct) {
            (SelectKind::Count, true) => write!(f, "COUNT(DISTINCT {})", self.selection.alias)?,
            (SelectKind::Count, false) => write!(f, "COUNT({})", self.selection.alias)?,
            (SelectKind::Entities, true) => write!(f, "DISTINCT {}", self.selection.alias)?,
            (SelectKind::Entities, false) => write!(f, "{}", self.selection.alias)?,
        }
        write!(f, " FROM {} {}", self.root_entity, self.root_alias)?;
        for join in &self.joins {
            write!(f, " JOIN {}.{} {}", join.source, join.relation, join.alias)?;
        }
        if let Some(pred) = &self.where_predicate {
            write!(f, " WHERE {}", pred)?;
        }
        if let Some(terms) = self.order_by.as_ref().filter(|t| !t.is_empty()) {
            let rendered: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
            write!(f, " ORDER BY {}", rendered.join(", "))?;
        }
        Ok(())
    }
}
