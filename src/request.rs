//! Client-facing request shape: entity path, navigation, operation, options.
//!
//! Built once per incoming request and read-only afterwards. Resource paths
//! and query options use the URL conventions of the conversation API:
//! `Users('alice')/conversations/$count`, `status eq active` style filters
//! written as `status=active`, and `title desc` order terms.

use crate::error::ApiError;
use crate::model::Value;
use crate::query::{CompareOp, FieldRef, Operand, OrderTerm, Predicate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Read operation requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Entity collection
    List,
    /// One entity addressed by key
    Single,
    /// `$count` over a collection
    Count,
}

/// Write operation requested by the client. Anything but `None` is unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MutationKind {
    #[default]
    None,
    Delete,
    Update,
}

impl FromStr for MutationKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "get" => Ok(MutationKind::None),
            "delete" => Ok(MutationKind::Delete),
            "update" | "patch" | "put" => Ok(MutationKind::Update),
            other => Err(ApiError::InvalidRequest(format!("Unknown method: {}", other))),
        }
    }
}

/// Leading entity set, optionally keyed: `Conversations('c1')`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPath {
    pub entity_set: String,
    pub key: Option<Value>,
}

impl EntityPath {
    pub fn new(entity_set: impl Into<String>) -> Self {
        Self {
            entity_set: entity_set.into(),
            key: None,
        }
    }

    pub fn keyed(entity_set: impl Into<String>, key: impl Into<Value>) -> Self {
        Self {
            entity_set: entity_set.into(),
            key: Some(key.into()),
        }
    }
}

/// One navigation hop: `/conversations` or `/conversations('c1')`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationSegment {
    pub relation: String,
    pub key: Option<Value>,
}

impl NavigationSegment {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            key: None,
        }
    }

    pub fn keyed(relation: impl Into<String>, key: impl Into<Value>) -> Self {
        Self {
            relation: relation.into(),
            key: Some(key.into()),
        }
    }
}

/// Client system query options. Filter and order terms name fields of the
/// selected entity; the generator binds them to the selection alias.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    pub filter: Option<Predicate>,
    #[serde(default)]
    pub order_by: Vec<OrderTerm>,
    pub top: Option<usize>,
    pub skip: Option<usize>,
}

/// Incoming request shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestShape {
    pub entity_path: EntityPath,
    #[serde(default)]
    pub navigation: Vec<NavigationSegment>,
    pub operation: OperationKind,
    #[serde(default)]
    pub mutation: MutationKind,
    #[serde(default)]
    pub options: QueryOptions,
}

impl RequestShape {
    pub fn new(entity_path: EntityPath, operation: OperationKind) -> Self {
        Self {
            entity_path,
            navigation: Vec::new(),
            operation,
            mutation: MutationKind::None,
            options: QueryOptions::default(),
        }
    }

    pub fn navigate(mut self, segment: NavigationSegment) -> Self {
        self.navigation.push(segment);
        self
    }

    pub fn with_mutation(mut self, mutation: MutationKind) -> Self {
        self.mutation = mutation;
        self
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.options.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, term: OrderTerm) -> Self {
        self.options.order_by.push(term);
        self
    }

    pub fn top(mut self, n: usize) -> Self {
        self.options.top = Some(n);
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.options.skip = Some(n);
        self
    }

    pub fn has_navigation(&self) -> bool {
        !self.navigation.is_empty()
    }
}

/// `name` or `name(key)`
fn parse_segment(raw: &str) -> Result<(String, Option<Value>), ApiError> {
    let invalid = || ApiError::InvalidRequest(format!("Malformed path segment: '{}'", raw));
    match raw.find('(') {
        None => {
            if raw.is_empty() || raw.contains(')') {
                return Err(invalid());
            }
            Ok((raw.to_string(), None))
        }
        Some(open) => {
            let name = &raw[..open];
            let key = raw[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
            if name.is_empty() || key.trim().is_empty() {
                return Err(invalid());
            }
            Ok((name.to_string(), Some(Value::parse_literal(key))))
        }
    }
}

/// Parse a resource path into a request shape.
///
/// A trailing `$count` selects a count; a key on the last segment selects a
/// single entity; anything else is a list.
pub fn parse_resource_path(path: &str) -> Result<RequestShape, ApiError> {
    let mut parts: Vec<&str> = path.trim().trim_matches('/').split('/').collect();
    let count = parts.last() == Some(&"$count");
    if count {
        parts.pop();
    }
    let Some((first, rest)) = parts.split_first() else {
        return Err(ApiError::InvalidRequest("Empty resource path".to_string()));
    };

    let (entity_set, key) = parse_segment(first)?;
    let entity_path = EntityPath { entity_set, key };
    let mut navigation = Vec::with_capacity(rest.len());
    for raw in rest {
        let (relation, key) = parse_segment(raw)?;
        navigation.push(NavigationSegment { relation, key });
    }

    let last_keyed = match navigation.last() {
        Some(segment) => segment.key.is_some(),
        None => entity_path.key.is_some(),
    };
    let operation = if count {
        OperationKind::Count
    } else if last_keyed {
        OperationKind::Single
    } else {
        OperationKind::List
    };

    let mut shape = RequestShape::new(entity_path, operation);
    shape.navigation = navigation;
    Ok(shape)
}

/// `field` or `alias.field`
fn parse_field(raw: &str) -> Result<FieldRef, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::InvalidRequest("Missing field name".to_string()));
    }
    Ok(match raw.split_once('.') {
        Some((alias, field)) => FieldRef::new(alias, field),
        None => FieldRef::unqualified(raw),
    })
}

/// Parse one comparison: `status=active`, `title!=Launch`, `messageId>=10`
pub fn parse_filter_term(expr: &str) -> Result<Predicate, ApiError> {
    const OPS: [(&str, CompareOp); 6] = [
        ("!=", CompareOp::Ne),
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("=", CompareOp::Eq),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
    ];
    for (symbol, op) in OPS {
        if let Some((field, value)) = expr.split_once(symbol) {
            return Ok(Predicate::compare(
                parse_field(field)?,
                op,
                Operand::Literal(Value::parse_literal(value)),
            ));
        }
    }
    Err(ApiError::InvalidRequest(format!(
        "Filter '{}' has no comparison operator",
        expr
    )))
}

/// Parse an order term: `title`, `title asc`, `title desc`
pub fn parse_order_term(expr: &str) -> Result<OrderTerm, ApiError> {
    let mut words = expr.split_whitespace();
    let field = parse_field(words.next().unwrap_or(""))?;
    let term = match words.next().map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") => OrderTerm::asc(field),
        Some("desc") => OrderTerm::desc(field),
        Some(other) => {
            return Err(ApiError::InvalidRequest(format!(
                "Unknown order direction '{}'",
                other
            )))
        }
    };
    if words.next().is_some() {
        return Err(ApiError::InvalidRequest(format!("Malformed order term '{}'", expr)));
    }
    Ok(term)
}
