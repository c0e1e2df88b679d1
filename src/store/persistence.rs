//! Persistence layer for the Conversation Store

use crate::error::StorageError;
use crate::model::Value;
use crate::store::{ConversationStore, EntityRecord};
use std::path::Path;

/// Sled-based implementation of ConversationStore. One sled tree per entity type,
/// keyed by the bincode-encoded record key.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Create a new SledStore at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Ok(Self { db })
    }

    /// Wrap an already opened database
    pub fn from_db(db: sled::Db) -> Self {
        Self { db }
    }

    fn tree(&self, entity: &str) -> Result<sled::Tree, StorageError> {
        self.db.open_tree(entity).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open tree for {}: {}", entity, e),
            ))
        })
    }

    fn encode_key(key: &Value) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(key)
            .map_err(|e| StorageError::Codec(format!("Failed to serialize record key: {}", e)))
    }

    fn decode_record(bytes: &[u8]) -> Result<EntityRecord, StorageError> {
        bincode::deserialize(bytes)
            .map_err(|e| StorageError::Codec(format!("Failed to deserialize record: {}", e)))
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to flush database: {}", e),
            ))
        })?;
        Ok(())
    }
}

impl ConversationStore for SledStore {
    fn get(&self, entity: &str, key: &Value) -> Result<Option<EntityRecord>, StorageError> {
        let tree = self.tree(entity)?;
        let key = Self::encode_key(key)?;
        match tree.get(key).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to get record: {}", e),
            ))
        })? {
            Some(value) => Ok(Some(Self::decode_record(&value)?)),
            None => Ok(None),
        }
    }

    fn put(&self, record: EntityRecord) -> Result<(), StorageError> {
        let tree = self.tree(&record.entity)?;
        let key = Self::encode_key(&record.key)?;
        let value = bincode::serialize(&record)
            .map_err(|e| StorageError::Codec(format!("Failed to serialize record: {}", e)))?;
        tree.insert(key, value).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to put record: {}", e),
            ))
        })?;
        Ok(())
    }

    fn scan(&self, entity: &str) -> Result<Vec<EntityRecord>, StorageError> {
        let tree = self.tree(entity)?;
        let mut records = Vec::new();
        for item in tree.iter() {
            let (_, value) = item.map_err(|e| {
                StorageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to iterate store: {}", e),
                ))
            })?;
            records.push(Self::decode_record(&value)?);
        }
        // Encoded key order is not value order
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}
