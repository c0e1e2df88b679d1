//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, InjectionError};

/// Map service errors to a message prefixed with a stable category.
pub fn map_error(e: &ApiError) -> String {
    let category = match e {
        ApiError::Classification(_) => "unsupported",
        ApiError::Build(_) | ApiError::InvalidRequest(_) => "bad-request",
        ApiError::Injection(InjectionError::NoIdentity) => "unauthenticated",
        ApiError::Injection(_) => "rewrite",
        ApiError::Execution(_) => "execution",
        ApiError::StorageError(_) => "storage",
        ApiError::ConfigError(_) => "config",
    };
    format!("error[{}]: {}", category, e)
}
