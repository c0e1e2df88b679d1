//! Entity model for the conversation API.
//!
//! Describes entity sets, key fields, plain fields, and navigable relations.
//! The query generator validates request shapes against it and the executor
//! uses it to resolve joins.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

pub const CONVERSATION: &str = "Conversation";
pub const MESSAGE_USER: &str = "MessageUser";
pub const MESSAGE: &str = "Message";

/// Scalar value stored in records and used in predicates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Text(_) => 3,
        }
    }

    /// JSON rendering for CLI output.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a literal from CLI/request text: integers, booleans, `null`, otherwise text.
    /// Single quotes around the literal force text.
    pub fn parse_literal(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(inner) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            return Value::Text(inner.to_string());
        }
        match raw {
            "null" => Value::Null,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => raw
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Definition of one entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    pub name: String,
    pub entity_set: String,
    pub key_field: String,
    pub fields: Vec<String>,
    /// relation name -> target entity name
    pub relations: BTreeMap<String, String>,
}

impl EntityDef {
    pub fn new(name: &str, entity_set: &str, key_field: &str) -> Self {
        Self {
            name: name.to_string(),
            entity_set: entity_set.to_string(),
            key_field: key_field.to_string(),
            fields: vec![key_field.to_string()],
            relations: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: &str) -> Self {
        self.fields.push(name.to_string());
        self
    }

    pub fn relation(mut self, name: &str, target: &str) -> Self {
        self.relations.insert(name.to_string(), target.to_string());
        self
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    pub fn relation_target(&self, relation: &str) -> Option<&str> {
        self.relations.get(relation).map(String::as_str)
    }
}

/// Entity model: lookup of entity definitions by name and by entity set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityModel {
    entities: BTreeMap<String, EntityDef>,
}

impl EntityModel {
    pub fn new(defs: impl IntoIterator<Item = EntityDef>) -> Self {
        Self {
            entities: defs.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }

    /// The conversation API model: conversations, their member users, and messages.
    pub fn conversations() -> Self {
        Self::new([
            EntityDef::new(CONVERSATION, "Conversations", "conversationId")
                .field("title")
                .field("status")
                .relation("messageUsers", MESSAGE_USER)
                .relation("messages", MESSAGE),
            EntityDef::new(MESSAGE_USER, "Users", "username")
                .field("displayName")
                .relation("conversations", CONVERSATION),
            EntityDef::new(MESSAGE, "Messages", "messageId")
                .field("text")
                .field("sender")
                .relation("conversation", CONVERSATION),
        ])
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    pub fn by_entity_set(&self, entity_set: &str) -> Option<&EntityDef> {
        self.entities.values().find(|e| e.entity_set == entity_set)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.entities.values()
    }
}

impl Default for EntityModel {
    fn default() -> Self {
        Self::conversations()
    }
}
