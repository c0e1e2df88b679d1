//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("query.page_size", 50_i64)?
        .set_default("policy.entity", "Conversation")?
        .set_default("policy.relation", "messageUsers")?
        .set_default("policy.member_field", "username")?
        .set_default("policy.alias", "E0")?
        .set_default("policy.parameter", "username")?
        .set_default(
            "storage.store_path",
            crate::config::default_store_path().to_string_lossy().to_string(),
        )
}
