//! Integration tests for the conversation membership rewrite

mod cli_commands;
mod config_integration;
mod scenarios;
mod sled_store;
mod test_utils;
