//! CLI route: single route table and run context. Dispatches to the query service and presentation.

use crate::cli::command_name;
use crate::cli::parse::{Commands, RequestArgs};
use crate::cli::presentation::{
    format_explain_json, format_explain_text, format_response_json, format_response_text,
    format_seed_summary, format_users_json, format_users_text,
};
use crate::config::{ConfigLoader, GuardConfig};
use crate::error::{ApiError, StorageError};
use crate::model::MESSAGE_USER;
use crate::query::Predicate;
use crate::request::{parse_filter_term, parse_order_term, parse_resource_path, RequestShape};
use crate::service::ConversationQueryService;
use crate::store::{ConversationStore, Fixture, SledStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Runtime context for CLI execution: loaded config, opened store, and the query service.
pub struct RunContext {
    config: GuardConfig,
    store_path: PathBuf,
    store: Arc<SledStore>,
    service: ConversationQueryService,
}

impl RunContext {
    /// Create run context from workspace root, optional config path, and optional store override.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        store_override: Option<PathBuf>,
    ) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        let config = config.validated()?;

        let store_path = store_override.unwrap_or_else(|| config.storage.store_path.clone());
        std::fs::create_dir_all(&store_path)
            .map_err(|e| ApiError::StorageError(StorageError::IoError(e)))?;
        let store = Arc::new(SledStore::new(&store_path)?);

        let service = ConversationQueryService::from_config(
            Arc::clone(&store) as Arc<dyn ConversationStore>,
            &config,
        );

        Ok(Self {
            config,
            store_path,
            store,
            service,
        })
    }

    pub fn service(&self) -> &ConversationQueryService {
        &self.service
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = self.execute_inner(command);
        info!(
            command = command_name(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Seed { fixture } => {
                let path = fixture
                    .clone()
                    .or_else(|| self.config.storage.fixture.clone())
                    .ok_or_else(|| {
                        ApiError::InvalidRequest(
                            "No fixture given and storage.fixture is not configured".to_string(),
                        )
                    })?;
                let fixture = Fixture::load(&path)?;
                fixture.apply(self.store.as_ref())?;
                self.store.flush()?;
                Ok(format_seed_summary(&fixture, &self.store_path))
            }
            Commands::Query { request, format } => {
                let shape = build_request(request)?;
                let response = self.service.handle(&shape, request.user.as_deref())?;
                Ok(match format.as_str() {
                    "json" => format_response_json(&response),
                    _ => format_response_text(&response),
                })
            }
            Commands::Explain { request, format } => {
                let shape = build_request(request)?;
                let explain = self.service.explain(&shape, request.user.as_deref())?;
                Ok(match format.as_str() {
                    "json" => format_explain_json(&explain),
                    _ => format_explain_text(&explain),
                })
            }
            Commands::Users { format } => {
                let users = self.store.scan(MESSAGE_USER)?;
                Ok(match format.as_str() {
                    "json" => format_users_json(&users),
                    _ => format_users_text(&users),
                })
            }
        }
    }
}

/// Turn CLI request arguments into a request shape
pub fn build_request(args: &RequestArgs) -> Result<RequestShape, ApiError> {
    let mut shape = parse_resource_path(&args.path)?.with_mutation(args.method.parse()?);

    let mut filter: Option<Predicate> = None;
    for term in &args.filters {
        let next = parse_filter_term(term)?;
        filter = Some(match filter {
            Some(existing) => Predicate::and(existing, next),
            None => next,
        });
    }
    if let Some(filter) = filter {
        shape = shape.with_filter(filter);
    }
    for term in &args.order_by {
        shape = shape.order_by(parse_order_term(term)?);
    }
    if let Some(top) = args.top {
        shape = shape.top(top);
    }
    if let Some(skip) = args.skip {
        shape = shape.skip(skip);
    }
    Ok(shape)
}
