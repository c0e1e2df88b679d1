//! CLI parse: clap types for convoguard. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// convoguard - conversation membership access control for API reads
#[derive(Parser)]
#[command(name = "convoguard")]
#[command(about = "Serve conversation reads filtered to the requesting user's memberships")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (for config/config.toml)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides storage.store_path)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Enable verbose logging, including rewrite audit lines
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes a file)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// A read request as seen by the API
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Resource path, e.g. Conversations, Conversations('c1'), Users('bob')/conversations/$count
    pub path: String,

    /// Authenticated username from the transport layer (omit for anonymous)
    #[arg(long)]
    pub user: Option<String>,

    /// Filter term on the selected entity, e.g. status=active (repeatable, ANDed)
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Order term, e.g. "title desc" (repeatable)
    #[arg(long = "orderby")]
    pub order_by: Vec<String>,

    /// Client row limit
    #[arg(long)]
    pub top: Option<usize>,

    /// Client row offset
    #[arg(long)]
    pub skip: Option<usize>,

    /// Request method (get, delete, update)
    #[arg(long, default_value = "get")]
    pub method: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load users, conversations, memberships, and messages from a TOML fixture
    Seed {
        /// Fixture path (defaults to storage.fixture)
        fixture: Option<PathBuf>,
    },
    /// Execute a read request as a user
    Query {
        #[command(flatten)]
        request: RequestArgs,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the base and rewritten queries for a request without executing
    Explain {
        #[command(flatten)]
        request: RequestArgs,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List stored users and their conversation memberships
    Users {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
