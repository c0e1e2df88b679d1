//! Conversation query service
//!
//! Single dispatch point for conversation reads. Every request passes through
//! classification, base query generation, identity resolution, the membership
//! rewrite, and execution, in that order. There is no path to the executor
//! that skips the rewrite.

use crate::config::GuardConfig;
use crate::error::{ApiError, InjectionError};
use crate::execute::{QueryExecutionAdapter, QueryResult, StoreExecutor};
use crate::identity::{resolve_principal, IdentityResolver, Principal, StoreIdentityResolver};
use crate::logging::AUDIT_TARGET;
use crate::model::EntityModel;
use crate::query::classify::{classify_request, ContextKind};
use crate::query::{
    BaseQueryBuilder, GeneratedQuery, MembershipPolicy, ModelQueryGenerator,
    SecurityPredicateInjector,
};
use crate::request::RequestShape;
use crate::store::ConversationStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a handled request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResponse {
    pub context_kind: ContextKind,
    pub result: QueryResult,
    /// Fingerprint of the executed query; `None` when nothing was executed
    pub fingerprint: Option<String>,
}

impl QueryResponse {
    /// Empty response for an unauthenticated request: empty list, no entity,
    /// or zero, depending on the operation
    pub fn empty_for(kind: ContextKind) -> Self {
        Self {
            context_kind: kind,
            result: QueryResult::empty_for(kind),
            fingerprint: None,
        }
    }
}

/// Query plan for one request, without executing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explain {
    pub context_kind: ContextKind,
    /// Base query as generated
    pub base: String,
    /// Rewritten query; `None` when no principal could be resolved
    pub filtered: Option<String>,
    pub fingerprint: Option<String>,
    pub principal: Option<String>,
}

/// Conversation query service
///
/// Owns the pipeline components. The store is shared with the executor and
/// the identity resolver.
pub struct ConversationQueryService {
    store: Arc<dyn ConversationStore>,
    resolver: Box<dyn IdentityResolver + Send + Sync>,
    builder: BaseQueryBuilder<ModelQueryGenerator>,
    injector: SecurityPredicateInjector,
    executor: Arc<dyn QueryExecutionAdapter + Send + Sync>,
    page_size: usize,
}

impl ConversationQueryService {
    /// Create a service over `store` with the default model, resolver, and executor
    pub fn new(store: Arc<dyn ConversationStore>, policy: MembershipPolicy, page_size: usize) -> Self {
        let model = EntityModel::conversations();
        let executor = Arc::new(StoreExecutor::new(Arc::clone(&store), model.clone()));
        Self {
            store,
            resolver: Box::new(StoreIdentityResolver),
            builder: BaseQueryBuilder::new(ModelQueryGenerator::new(model)),
            injector: SecurityPredicateInjector::new(policy),
            executor,
            page_size,
        }
    }

    /// Create a service from loaded configuration
    pub fn from_config(store: Arc<dyn ConversationStore>, config: &GuardConfig) -> Self {
        Self::new(store, config.policy.clone(), config.query.page_size)
    }

    /// Replace the execution adapter
    pub fn with_executor(mut self, executor: Arc<dyn QueryExecutionAdapter + Send + Sync>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the identity resolver
    pub fn with_resolver(mut self, resolver: Box<dyn IdentityResolver + Send + Sync>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn policy(&self) -> &MembershipPolicy {
        self.injector.policy()
    }

    fn resolve(&self, raw_identity: Option<&str>) -> Option<Principal> {
        resolve_principal(self.resolver.as_ref(), raw_identity, self.store.as_ref())
    }

    fn plan(&self, shape: &RequestShape) -> Result<(ContextKind, GeneratedQuery), ApiError> {
        let kind = classify_request(shape)?;
        let base = self.builder.build(shape, kind, self.page_size)?;
        Ok((kind, base))
    }

    /// Handle one read request
    ///
    /// # Arguments
    /// * `shape` - Parsed request shape
    /// * `raw_identity` - Identity string from the transport layer, if any
    ///
    /// # Returns
    /// The shaped result. A request with no verifiable identity yields the
    /// empty result for its operation and never reaches the executor.
    pub fn handle(
        &self,
        shape: &RequestShape,
        raw_identity: Option<&str>,
    ) -> Result<QueryResponse, ApiError> {
        let (kind, base) = self.plan(shape)?;
        let principal = self.resolve(raw_identity);

        info!(
            target: AUDIT_TARGET,
            username = principal.as_ref().map(Principal::username).unwrap_or("<none>"),
            context = %kind,
            "Conversation query"
        );

        let filtered = match self.injector.inject(base, principal.as_ref()) {
            Ok(filtered) => filtered,
            Err(InjectionError::NoIdentity) => {
                warn!(context = %kind, "No principal; returning empty result");
                return Ok(QueryResponse::empty_for(kind));
            }
            Err(e) => return Err(e.into()),
        };

        let result = self.executor.execute(&filtered, kind)?;
        Ok(QueryResponse {
            context_kind: kind,
            result,
            fingerprint: Some(filtered.fingerprint()),
        })
    }

    /// Show the base and rewritten queries for a request without executing
    pub fn explain(
        &self,
        shape: &RequestShape,
        raw_identity: Option<&str>,
    ) -> Result<Explain, ApiError> {
        let (kind, base) = self.plan(shape)?;
        let principal = self.resolve(raw_identity);
        let rendered = base.to_string();

        let (filtered, fingerprint) = match self.injector.inject(base, principal.as_ref()) {
            Ok(filtered) => (Some(filtered.to_string()), Some(filtered.fingerprint())),
            Err(InjectionError::NoIdentity) => (None, None),
            Err(e) => return Err(e.into()),
        };

        Ok(Explain {
            context_kind: kind,
            base: rendered,
            filtered,
            fingerprint,
            principal: principal.map(|p| p.username().to_string()),
        })
    }
}
