//! Conversation Store
//!
//! Record storage for conversations, member users, and messages. Records carry
//! scalar fields plus relation links (keys of related records), which is all
//! the executor needs to expand joins.

pub mod fixture;
pub mod persistence;

pub use fixture::Fixture;
pub use persistence::SledStore;

use crate::error::StorageError;
use crate::model::Value;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored entity instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity: String,
    pub key: Value,
    pub fields: BTreeMap<String, Value>,
    /// relation name -> keys of linked records
    pub links: BTreeMap<String, Vec<Value>>,
}

impl EntityRecord {
    pub fn new(entity: impl Into<String>, key: impl Into<Value>) -> Self {
        Self {
            entity: entity.into(),
            key: key.into(),
            fields: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Add a link unless already present
    pub fn link(&mut self, relation: &str, key: Value) {
        let keys = self.links.entry(relation.to_string()).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    pub fn linked(&self, relation: &str) -> &[Value] {
        self.links.get(relation).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Field lookup; the key field resolves to `key` when not stored as a field
    pub fn field(&self, name: &str, key_field: &str) -> Value {
        if name == key_field {
            return self.key.clone();
        }
        self.fields.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Key rendered without quotes
    pub fn key_text(&self) -> String {
        match &self.key {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Conversation store interface
pub trait ConversationStore: Send + Sync {
    fn get(&self, entity: &str, key: &Value) -> Result<Option<EntityRecord>, StorageError>;
    fn put(&self, record: EntityRecord) -> Result<(), StorageError>;

    /// All records of one entity type, ordered by key
    fn scan(&self, entity: &str) -> Result<Vec<EntityRecord>, StorageError>;
}

/// Link two records in both directions: `from.relation -> to` and `to.inverse -> from`
pub fn link_records(
    store: &dyn ConversationStore,
    from: (&str, &Value),
    relation: &str,
    to: (&str, &Value),
    inverse: &str,
) -> Result<(), StorageError> {
    let mut source = store
        .get(from.0, from.1)?
        .ok_or_else(|| StorageError::RecordNotFound {
            entity: from.0.to_string(),
            key: from.1.to_string(),
        })?;
    let mut target = store
        .get(to.0, to.1)?
        .ok_or_else(|| StorageError::RecordNotFound {
            entity: to.0.to_string(),
            key: to.1.to_string(),
        })?;
    source.link(relation, to.1.clone());
    target.link(inverse, from.1.clone());
    store.put(source)?;
    store.put(target)?;
    Ok(())
}

/// In-memory store, used by tests and as the default executor backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, BTreeMap<Value, EntityRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConversationStore for MemoryStore {
    fn get(&self, entity: &str, key: &Value) -> Result<Option<EntityRecord>, StorageError> {
        Ok(self
            .tables
            .read()
            .get(entity)
            .and_then(|table| table.get(key))
            .cloned())
    }

    fn put(&self, record: EntityRecord) -> Result<(), StorageError> {
        self.tables
            .write()
            .entry(record.entity.clone())
            .or_default()
            .insert(record.key.clone(), record);
        Ok(())
    }

    fn scan(&self, entity: &str) -> Result<Vec<EntityRecord>, StorageError> {
        Ok(self
            .tables
            .read()
            .get(entity)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }
}
