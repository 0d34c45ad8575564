use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use nimbus_core::ConversationRecord;

use super::{DocumentBackend, DocumentKey};
use crate::error::StoreError;

/// Process-local backend. Nothing survives a restart.
///
/// `set_unavailable(true)` makes every call fail the way an unreachable
/// remote store would.
#[derive(Default)]
pub struct MemoryBackend {
    docs: DashMap<DocumentKey, ConversationRecord>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory backend offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &DocumentKey) -> Result<Option<ConversationRecord>, StoreError> {
        self.check()?;
        Ok(self.docs.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &DocumentKey, record: &ConversationRecord) -> Result<(), StoreError> {
        self.check()?;
        let _ = self.docs.insert(key.clone(), record.clone());
        Ok(())
    }
}
