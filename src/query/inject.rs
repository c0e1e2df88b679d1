//! Security predicate injection.
//!
//! Rewrites a generated query so it only returns entities the principal is a
//! member of:
//!
//! ```text
//! SELECT E1 FROM Conversation E1 WHERE E1.status = 'active' ORDER BY E1.conversationId
//! ->
//! SELECT DISTINCT E1 FROM Conversation E1 JOIN E1.messageUsers E0
//!   WHERE E0.username = :username AND E1.status = 'active' ORDER BY E1.conversationId
//! ```
//!
//! The rewrite is a tree transform on `GeneratedQuery`. `FilteredQuery` can
//! only be constructed here, so anything accepted by the executor carries the
//! membership join, the membership predicate as the leftmost conjunct, DISTINCT,
//! and a bound principal.

use crate::error::InjectionError;
use crate::identity::Principal;
use crate::logging::AUDIT_TARGET;
use crate::model::{Value, CONVERSATION};
use crate::query::{FieldRef, GeneratedQuery, Join, Predicate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Which entity is protected and how membership is expressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipPolicy {
    /// Protected entity type
    #[serde(default = "default_entity")]
    pub entity: String,
    /// Relation from the protected entity to its members
    #[serde(default = "default_relation")]
    pub relation: String,
    /// Member field compared against the principal's username
    #[serde(default = "default_member_field")]
    pub member_field: String,
    /// Alias reserved for the membership join
    #[serde(default = "default_alias")]
    pub alias: String,
    /// Bind parameter carrying the principal's username
    #[serde(default = "default_parameter")]
    pub parameter: String,
}

fn default_entity() -> String {
    CONVERSATION.to_string()
}

fn default_relation() -> String {
    "messageUsers".to_string()
}

fn default_member_field() -> String {
    "username".to_string()
}

fn default_alias() -> String {
    "E0".to_string()
}

fn default_parameter() -> String {
    "username".to_string()
}

impl Default for MembershipPolicy {
    fn default() -> Self {
        Self {
            entity: default_entity(),
            relation: default_relation(),
            member_field: default_member_field(),
            alias: default_alias(),
            parameter: default_parameter(),
        }
    }
}

impl MembershipPolicy {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("entity", &self.entity),
            ("relation", &self.relation),
            ("member_field", &self.member_field),
            ("alias", &self.alias),
            ("parameter", &self.parameter),
        ] {
            if value.trim().is_empty() {
                return Err(format!("policy.{} cannot be empty", name));
            }
        }
        Ok(())
    }

    /// The membership predicate: `<alias>.<member_field> = :<parameter>`
    pub fn security_predicate(&self) -> Predicate {
        Predicate::eq_param(
            FieldRef::new(self.alias.clone(), self.member_field.clone()),
            self.parameter.clone(),
        )
    }
}

/// Bound parameter values, keyed by parameter name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Bindings(BTreeMap<String, Value>);

impl Bindings {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn bind(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }
}

/// Query after injection, paired with its bindings
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredQuery {
    query: GeneratedQuery,
    bindings: Bindings,
}

impl FilteredQuery {
    pub fn query(&self) -> &GeneratedQuery {
        &self.query
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Stable digest of the rendered query and its parameter names. Bound
    /// values are left out so audit lines can be correlated without the username.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.query.to_string().as_bytes());
        for (name, _) in self.bindings.iter() {
            hasher.update(b"\0");
            hasher.update(name.as_bytes());
        }
        hex::encode(&hasher.finalize().as_bytes()[..8])
    }
}

impl fmt::Display for FilteredQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query)
    }
}

/// Adds the membership join and predicate to generated queries
#[derive(Debug, Clone, Default)]
pub struct SecurityPredicateInjector {
    policy: MembershipPolicy,
}

impl SecurityPredicateInjector {
    pub fn new(policy: MembershipPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MembershipPolicy {
        &self.policy
    }

    /// Check that `base` can be rewritten. Runs before the principal is
    /// consulted so structural defects surface even for anonymous requests.
    fn check_base(&self, base: &GeneratedQuery) -> Result<(), InjectionError> {
        base.check_structure().map_err(InjectionError::MalformedBase)?;

        if base.selection.entity != self.policy.entity {
            return Err(InjectionError::UnprotectedEntity(base.selection.entity.clone()));
        }
        if let Some(existing) = base
            .joins
            .iter()
            .find(|j| j.relation == self.policy.relation)
        {
            return Err(InjectionError::AlreadyFiltered {
                alias: existing.source.clone(),
                relation: existing.relation.clone(),
            });
        }
        if base.has_alias(&self.policy.alias) {
            return Err(InjectionError::AliasCollision(self.policy.alias.clone()));
        }
        Ok(())
    }

    /// Rewrite `base` for `principal`. No principal fails closed with
    /// `InjectionError::NoIdentity`; callers map it to an empty result.
    pub fn inject(
        &self,
        base: GeneratedQuery,
        principal: Option<&Principal>,
    ) -> Result<FilteredQuery, InjectionError> {
        debug!(target: AUDIT_TARGET, query = %base, "Pre-rewrite query");

        self.check_base(&base)?;
        let principal = principal.ok_or(InjectionError::NoIdentity)?;

        let GeneratedQuery {
            root_entity,
            root_alias,
            selection,
            distinct: _,
            mut joins,
            where_predicate,
            order_by,
            paging,
            top,
            skip,
        } = base;

        joins.push(Join::new(
            selection.alias.clone(),
            self.policy.relation.clone(),
            self.policy.alias.clone(),
        ));
        let where_predicate = Some(self.policy.security_predicate().and_then(where_predicate));

        let query = GeneratedQuery {
            root_entity,
            root_alias,
            selection,
            distinct: true,
            joins,
            where_predicate,
            order_by,
            paging,
            top,
            skip,
        };

        let mut bindings = Bindings::default();
        bindings.bind(
            &self.policy.parameter,
            Value::Text(principal.username().to_string()),
        );

        let filtered = FilteredQuery { query, bindings };
        debug!(
            target: AUDIT_TARGET,
            query = %filtered,
            fingerprint = %filtered.fingerprint(),
            "Post-rewrite query"
        );
        Ok(filtered)
    }
}
