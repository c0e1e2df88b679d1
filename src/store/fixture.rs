//! TOML fixtures for seeding a store.
//!
//! ```toml
//! [[users]]
//! username = "alice"
//! display_name = "Alice"
//!
//! [[conversations]]
//! id = "c1"
//! title = "Launch"
//! status = "active"
//! members = ["alice", "bob"]
//!
//! [[messages]]
//! id = 1
//! conversation = "c1"
//! sender = "alice"
//! text = "hello"
//! ```

use crate::error::StorageError;
use crate::model::{Value, CONVERSATION, MESSAGE, MESSAGE_USER};
use crate::store::{link_records, ConversationStore, EntityRecord};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureUser {
    pub username: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureConversation {
    pub id: String,
    pub title: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureMessage {
    pub id: i64,
    pub conversation: String,
    pub sender: String,
    pub text: String,
}

/// Seed data for users, conversations (with members), and messages
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<FixtureUser>,
    #[serde(default)]
    pub conversations: Vec<FixtureConversation>,
    #[serde(default)]
    pub messages: Vec<FixtureMessage>,
}

impl Fixture {
    pub fn from_toml(content: &str) -> Result<Self, StorageError> {
        toml::from_str(content).map_err(|e| StorageError::InvalidFixture(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Write all records and membership links into `store`. Members and
    /// message conversations must refer to records in this fixture or the store.
    pub fn apply(&self, store: &dyn ConversationStore) -> Result<(), StorageError> {
        for user in &self.users {
            let mut record = EntityRecord::new(MESSAGE_USER, user.username.as_str());
            if let Some(name) = &user.display_name {
                record = record.with_field("displayName", name.as_str());
            }
            store.put(record)?;
        }

        for conv in &self.conversations {
            let mut record = EntityRecord::new(CONVERSATION, conv.id.as_str());
            if let Some(title) = &conv.title {
                record = record.with_field("title", title.as_str());
            }
            if let Some(status) = &conv.status {
                record = record.with_field("status", status.as_str());
            }
            store.put(record)?;
            let conv_key = Value::from(conv.id.as_str());
            for member in &conv.members {
                link_records(
                    store,
                    (CONVERSATION, &conv_key),
                    "messageUsers",
                    (MESSAGE_USER, &Value::from(member.as_str())),
                    "conversations",
                )
                .map_err(|e| {
                    StorageError::InvalidFixture(format!(
                        "conversation {} member {}: {}",
                        conv.id, member, e
                    ))
                })?;
            }
        }

        for msg in &self.messages {
            store.put(
                EntityRecord::new(MESSAGE, Value::Int(msg.id))
                    .with_field("sender", msg.sender.as_str())
                    .with_field("text", msg.text.as_str()),
            )?;
            link_records(
                store,
                (MESSAGE, &Value::Int(msg.id)),
                "conversation",
                (CONVERSATION, &Value::from(msg.conversation.as_str())),
                "messages",
            )
            .map_err(|e| {
                StorageError::InvalidFixture(format!("message {}: {}", msg.id, e))
            })?;
        }

        info!(
            users = self.users.len(),
            conversations = self.conversations.len(),
            messages = self.messages.len(),
            "Fixture applied"
        );
        Ok(())
    }
}
