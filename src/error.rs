//! Error types for the conversation access-control rewrite.
//!
//! Each layer (classify, build, inject, execute, store) owns its own enum;
//! `ApiError` is the umbrella the service and CLI surface to callers.

use crate::query::classify::ContextKind;
use thiserror::Error;

/// Request shape cannot be mapped to a query context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("Unsupported operation: {0} requests are not served by the query rewrite")]
    UnsupportedMutation(String),
}

/// Upstream query generation failed; no partial query is produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Unknown entity set: {0}")]
    UnknownEntitySet(String),

    #[error("Unknown relation '{relation}' on entity {entity}")]
    UnknownRelation { entity: String, relation: String },

    #[error("Unknown field '{field}' on entity {entity}")]
    UnknownField { entity: String, field: String },

    #[error("{0:?} request does not address a single entity key")]
    MissingKey(ContextKind),

    #[error("{0:?} request addresses a single entity key")]
    UnexpectedKey(ContextKind),

    #[error("Context {0:?} does not match the request's navigation")]
    ContextMismatch(ContextKind),
}

/// Security predicate injection failed; terminal for the request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    #[error("No authenticated principal; request must resolve to an empty result")]
    NoIdentity,

    #[error("Alias collision: base query already uses reserved alias '{0}'")]
    AliasCollision(String),

    #[error("Base query already joins '{relation}' from '{alias}'; rewrite is not idempotent")]
    AlreadyFiltered { alias: String, relation: String },

    #[error("Malformed base query: {0}")]
    MalformedBase(String),

    #[error("Entity {0} is not covered by a membership policy")]
    UnprotectedEntity(String),
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {entity}({key})")]
    RecordNotFound { entity: String, key: String },

    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),

    #[error("Storage codec error: {0}")]
    Codec(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Identity verification failures; the service treats every variant as "no principal"
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Empty identity string")]
    Empty,

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Identity store error: {0}")]
    Storage(#[from] StorageError),
}

/// Downstream execution failures, propagated unmodified
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Unbound query parameter :{0}")]
    UnboundParameter(String),

    #[error("Unknown alias in query: {0}")]
    UnknownAlias(String),

    #[error("Unknown entity in query: {0}")]
    UnknownEntity(String),

    #[error("Single-entity query matched {0} rows")]
    AmbiguousSingle(usize),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// API-level errors returned by the query service
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Query build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Security rewrite failed: {0}")]
    Injection(#[from] InjectionError),

    #[error("Query execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
