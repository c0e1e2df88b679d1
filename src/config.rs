//! Configuration System
//!
//! Layered configuration: built-in defaults, the global file, workspace files,
//! then `CONVOGUARD__SECTION__KEY` environment variables. Validation runs
//! after loading and reports every problem at once.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::query::MembershipPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

/// Default sled location under the user's data directory
pub fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "convoguard")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".convoguard/store"))
}

fn default_page_size() -> usize {
    50
}

/// Query pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Server page size hint for list contexts; 0 disables server paging
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Storage paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Fixture applied by `convoguard seed` when no path is given
    #[serde(default)]
    pub fixture: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            fixture: None,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub query: QueryConfig,

    /// Membership policy applied by the security rewrite
    #[serde(default)]
    pub policy: MembershipPolicy,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Policy(String),
    Storage(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Policy(msg) => write!(f, "Policy: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl GuardConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.policy.validate() {
            errors.push(ValidationError::Policy(e));
        }
        if is_generated_alias(&self.policy.alias) {
            errors.push(ValidationError::Policy(format!(
                "alias '{}' collides with generated query aliases",
                self.policy.alias
            )));
        }

        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Store path cannot be empty".to_string(),
            ));
        }

        if let Err(e) = crate::logging::validate(&self.logging) {
            errors.push(ValidationError::Logging(e.to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding all errors into one `ApiError`
    pub fn validated(self) -> Result<Self, ApiError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}

/// `E1` and `R<n>` are assigned by the query generator
fn is_generated_alias(alias: &str) -> bool {
    if alias == crate::query::builder::ROOT_ALIAS {
        return true;
    }
    match alias.strip_prefix('R') {
        Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Loads `GuardConfig` from the configured sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace
    ///
    /// Precedence (lowest to highest): defaults, `~/.config/convoguard/config.toml`,
    /// `config/config.toml`, `config/{CONVOGUARD_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<GuardConfig, config::ConfigError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(
            config::Environment::with_prefix("CONVOGUARD")
                .separator("__")
                .try_parsing(true),
        );
        builder.build()?.try_deserialize()
    }

    /// Load configuration from a single file on top of the defaults
    pub fn load_from_file(path: &Path) -> Result<GuardConfig, config::ConfigError> {
        merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Path of the global configuration file, if `HOME` is set
    pub fn global_config_path() -> Option<PathBuf> {
        sources::global_file::global_config_path()
    }

    pub fn default() -> GuardConfig {
        GuardConfig::default()
    }
}
