//! CLI presentation: text and json formatters per command family.

mod query;
mod store;

pub use query::{format_explain_json, format_explain_text, format_response_json, format_response_text};
pub use store::{format_seed_summary, format_users_json, format_users_text};

use crate::model::Value;

/// Table cell text: unquoted strings, `-` for null
fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}
