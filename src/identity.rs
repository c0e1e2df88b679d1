//! Principal resolution.
//!
//! The transport layer hands over a raw identity string (possibly absent).
//! A resolver verifies it against stored user records. Absence and every
//! failure collapse into "no principal"; the rewrite then fails closed.

use crate::error::IdentityError;
use crate::model::{Value, MESSAGE_USER};
use crate::store::ConversationStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Verified identity of the requester, scoped to one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    username: String,
}

impl Principal {
    /// Create a principal. Empty usernames are rejected so a principal can
    /// never bind a value that matches "no user".
    pub fn new(username: impl Into<String>) -> Result<Self, IdentityError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(Self { username })
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Maps a transport-level identity string to a principal
pub trait IdentityResolver {
    fn resolve(
        &self,
        raw_identity: &str,
        store: &dyn ConversationStore,
    ) -> Result<Principal, IdentityError>;
}

/// Verifies the identity against `MessageUser` records in the store
#[derive(Debug, Clone, Default)]
pub struct StoreIdentityResolver;

impl IdentityResolver for StoreIdentityResolver {
    fn resolve(
        &self,
        raw_identity: &str,
        store: &dyn ConversationStore,
    ) -> Result<Principal, IdentityError> {
        let username = raw_identity.trim();
        if username.is_empty() {
            return Err(IdentityError::Empty);
        }
        let key = Value::Text(username.to_string());
        match store.get(MESSAGE_USER, &key)? {
            Some(record) => Principal::new(record.key_text()),
            None => Err(IdentityError::UnknownUser(username.to_string())),
        }
    }
}

/// Resolve the principal for a request. Never fails: missing or unverifiable
/// identities yield `None`.
pub fn resolve_principal(
    resolver: &dyn IdentityResolver,
    raw_identity: Option<&str>,
    store: &dyn ConversationStore,
) -> Option<Principal> {
    let Some(raw) = raw_identity else {
        error!(
            "No authenticated user on the request; check the transport authentication setup. \
             Result will be empty"
        );
        return None;
    };
    match resolver.resolve(raw, store) {
        Ok(principal) => {
            debug!(username = %principal.username(), "Resolved principal");
            Some(principal)
        }
        Err(e) => {
            warn!(error = %e, "Identity verification failed; treating request as unauthenticated");
            None
        }
    }
}
