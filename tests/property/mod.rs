//! Property-based tests for the membership rewrite

mod rewrite;
