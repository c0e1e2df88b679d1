//! CLI domain: parse, route, help, output, and presentation only.
//! No query logic; the route table dispatches to the query service.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands, RequestArgs};
pub use presentation::{
    format_explain_json, format_explain_text, format_response_json, format_response_text,
    format_seed_summary, format_users_json, format_users_text,
};
pub use route::RunContext;
