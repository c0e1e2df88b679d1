//! CLI command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name string for log lines (e.g. "query", "seed").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Seed { .. } => "seed",
        Commands::Query { .. } => "query",
        Commands::Explain { .. } => "explain",
        Commands::Users { .. } => "users",
    }
}
