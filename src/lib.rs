//! convoguard: conversation membership access control
//!
//! Every read against the conversation API is rewritten so it only returns
//! conversations the requesting user belongs to. The pipeline classifies the
//! request, generates the base query, injects the membership join and
//! predicate, then executes the filtered query.

pub mod cli;
pub mod config;
pub mod error;
pub mod execute;
pub mod identity;
pub mod logging;
pub mod model;
pub mod query;
pub mod request;
pub mod service;
pub mod store;
