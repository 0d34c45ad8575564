//! Document backends: keyed get/put of whole conversation records.

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use async_trait::async_trait;
use nimbus_core::ConversationRecord;

use crate::error::StoreError;

/// Address of one conversation document.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct DocumentKey {
    collection: String,
    user_id: String,
    session_id: String,
}

impl DocumentKey {
    /// Build a key, rejecting empty components.
    ///
    /// `/` in the session id is replaced with `_` so client-chosen ids cannot
    /// address a different document path.
    pub fn new(collection: &str, user_id: &str, session_id: &str) -> Result<Self, StoreError> {
        if collection.trim().is_empty() {
            return Err(StoreError::InvalidKey("collection must not be empty".into()));
        }
        if user_id.trim().is_empty() {
            return Err(StoreError::InvalidKey("user_id must not be empty".into()));
        }
        let session_id = sanitize_session_id(session_id);
        if session_id.trim().is_empty() {
            return Err(StoreError::InvalidKey("session_id must not be empty".into()));
        }
        Ok(Self {
            collection: collection.to_string(),
            user_id: user_id.to_string(),
            session_id,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.collection, self.user_id, self.session_id)
    }
}

pub fn sanitize_session_id(session_id: &str) -> String {
    session_id.replace('/', "_")
}

/// Storage for conversation documents.
///
/// `put` is a full overwrite; there is no partial update and no
/// compare-and-set, so concurrent writers to one key are last-writer-wins.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &DocumentKey) -> Result<Option<ConversationRecord>, StoreError>;

    async fn put(&self, key: &DocumentKey, record: &ConversationRecord) -> Result<(), StoreError>;
}
