use std::sync::Arc;

use chrono::Utc;
use nimbus_core::{ConversationRecord, HistorySettings, Message};
use tracing::{debug, instrument};

use crate::backend::{DocumentBackend, DocumentKey};
use crate::bounding::{bound_history, HistoryLimits};
use crate::error::StoreError;

/// Per-(user, session) conversation history over a document backend.
///
/// Every turn is one `load` and one `append_and_save`. There is no caching
/// and no per-session locking: two concurrent turns on one session each
/// overwrite the whole record and the later write wins.
#[derive(Clone)]
pub struct HistoryStore {
    backend: Arc<dyn DocumentBackend>,
    collection: String,
    limits: HistoryLimits,
}

impl HistoryStore {
    pub fn new(backend: Arc<dyn DocumentBackend>, settings: &HistorySettings) -> Self {
        Self {
            backend,
            collection: settings.collection.clone(),
            limits: HistoryLimits::from(settings),
        }
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Bounded history for a session, oldest first. A session that was never
    /// saved has an empty history.
    #[instrument(skip_all, fields(session_id = %session_id, user_id = %user_id))]
    pub async fn load(&self, user_id: &str, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let key = DocumentKey::new(&self.collection, user_id, session_id)?;
        let Some(record) = self.backend.get(&key).await? else {
            debug!("no stored history");
            return Ok(Vec::new());
        };
        let bounded = bound_history(&record.messages, self.limits);
        debug!(stored = record.messages.len(), served = bounded.len(), "history loaded");
        Ok(bounded)
    }

    /// Append one turn to `prior` and overwrite the stored record.
    ///
    /// `prior` is the history returned by [`load`](Self::load) for this turn,
    /// so the persisted history stays bounded too.
    #[instrument(skip_all, fields(session_id = %session_id, user_id = %user_id))]
    pub async fn append_and_save(
        &self,
        user_id: &str,
        session_id: &str,
        prior: Vec<Message>,
        user_message: Message,
        agent_message: Message,
    ) -> Result<ConversationRecord, StoreError> {
        let key = DocumentKey::new(&self.collection, user_id, session_id)?;
        let mut messages = prior;
        messages.push(user_message);
        messages.push(agent_message);

        let record = ConversationRecord::from_messages(user_id, key.session_id(), messages, Utc::now());
        self.backend.put(&key, &record).await?;
        debug!(message_count = record.message_count, "history saved");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, SqliteBackend};
    use crate::database::Database;
    use nimbus_core::Sender;

    fn settings(max_messages: usize, max_chars: usize) -> HistorySettings {
        HistorySettings {
            collection: "Weather-Chat".into(),
            max_messages,
            max_chars,
        }
    }

    fn backends() -> Vec<Arc<dyn DocumentBackend>> {
        let memory: Arc<dyn DocumentBackend> = Arc::new(MemoryBackend::new());
        let sqlite: Arc<dyn DocumentBackend> =
            Arc::new(SqliteBackend::new(Database::in_memory().unwrap()));
        vec![memory, sqlite]
    }

    async fn seed(backend: &Arc<dyn DocumentBackend>, session: &str, messages: Vec<Message>) {
        let key = DocumentKey::new("Weather-Chat", "1234", session).unwrap();
        let record = ConversationRecord::from_messages("1234", session, messages, Utc::now());
        backend.put(&key, &record).await.unwrap();
    }

    fn texts(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[tokio::test]
    async fn unknown_session_loads_empty() {
        for backend in backends() {
            let store = HistoryStore::new(backend, &settings(20, 8000));
            assert!(store.load("1234", "never-seen").await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn small_history_is_served_whole() {
        for backend in backends() {
            let history = vec![Message::user("hi"), Message::agent("hello"), Message::user("weather?")];
            seed(&backend, "s1", history.clone()).await;
            let store = HistoryStore::new(backend, &settings(20, 8000));
            assert_eq!(store.load("1234", "s1").await.unwrap(), history);
        }
    }

    #[tokio::test]
    async fn count_bound_keeps_most_recent() {
        for backend in backends() {
            seed(&backend, "s1", vec![Message::user("A"), Message::agent("B"), Message::user("C")]).await;
            let store = HistoryStore::new(backend, &settings(2, 8000));
            let loaded = store.load("1234", "s1").await.unwrap();
            assert_eq!(texts(&loaded), ["B", "C"]);
        }
    }

    #[tokio::test]
    async fn char_bound_drops_oldest() {
        for backend in backends() {
            seed(&backend, "s1", vec![Message::user("12345"), Message::agent("123456")]).await;
            let store = HistoryStore::new(backend, &settings(20, 10));
            let loaded = store.load("1234", "s1").await.unwrap();
            assert_eq!(texts(&loaded), ["123456"]);
        }
    }

    #[tokio::test]
    async fn oversized_single_message_is_kept() {
        for backend in backends() {
            seed(&backend, "s1", vec![Message::user("x".repeat(50))]).await;
            let store = HistoryStore::new(backend, &settings(20, 10));
            let loaded = store.load("1234", "s1").await.unwrap();
            assert_eq!(loaded.len(), 1);
            assert_eq!(loaded[0].char_len(), 50);
        }
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        for backend in backends() {
            let history: Vec<Message> = (0..30).map(|i| Message::user(format!("message {i}"))).collect();
            seed(&backend, "s1", history).await;
            let store = HistoryStore::new(backend, &settings(20, 100));
            let first = store.load("1234", "s1").await.unwrap();
            let second = store.load("1234", "s1").await.unwrap();
            assert_eq!(first, second);
            assert!(!first.is_empty());
        }
    }

    #[tokio::test]
    async fn append_then_load_round_trips() {
        for backend in backends() {
            let store = HistoryStore::new(backend, &settings(20, 8000));
            let prior = vec![Message::user("hi"), Message::agent("hello")];
            let parts = serde_json::json!([{"type": "function_call", "name": "get_weather", "args": {"city": "Oslo"}}]);
            let reply = Message::agent_with_parts("3 °C in Oslo", parts);

            store
                .append_and_save("1234", "s1", prior.clone(), Message::user("Oslo?"), reply.clone())
                .await
                .unwrap();

            let mut expected = prior;
            expected.push(Message::user("Oslo?"));
            expected.push(reply);
            assert_eq!(store.load("1234", "s1").await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn first_save_creates_record() {
        for backend in backends() {
            let store = HistoryStore::new(backend.clone(), &settings(20, 8000));
            let record = store
                .append_and_save("1234", "fresh", Vec::new(), Message::user("hi"), Message::agent("hello"))
                .await
                .unwrap();
            assert_eq!(record.message_count, 2);
            assert_eq!(record.last_message_sender, Some(Sender::Agent));
            assert_eq!(record.last_message_text, "hello");

            let key = DocumentKey::new("Weather-Chat", "1234", "fresh").unwrap();
            let stored = backend.get(&key).await.unwrap().unwrap();
            assert_eq!(stored.message_count, 2);
        }
    }

    #[tokio::test]
    async fn slash_in_session_id_uses_sanitized_key() {
        let backend: Arc<dyn DocumentBackend> = Arc::new(MemoryBackend::new());
        let store = HistoryStore::new(backend.clone(), &settings(20, 8000));
        let record = store
            .append_and_save("1234", "a/b", Vec::new(), Message::user("hi"), Message::agent("hello"))
            .await
            .unwrap();
        assert_eq!(record.session_id, "a_b");

        let key = DocumentKey::new("Weather-Chat", "1234", "a_b").unwrap();
        assert!(backend.get(&key).await.unwrap().is_some());
        assert_eq!(store.load("1234", "a/b").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let store = HistoryStore::new(Arc::new(MemoryBackend::new()), &settings(20, 8000));
        store
            .append_and_save("1234", "s1", Vec::new(), Message::user("a"), Message::agent("b"))
            .await
            .unwrap();
        assert!(store.load("1234", "s2").await.unwrap().is_empty());
        assert!(store.load("5678", "s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn outage_surfaces_as_error() {
        let backend = Arc::new(MemoryBackend::new());
        let store = HistoryStore::new(backend.clone(), &settings(20, 8000));
        backend.set_unavailable(true);

        assert!(matches!(store.load("1234", "s1").await, Err(StoreError::Unavailable(_))));
        let saved = store
            .append_and_save("1234", "s1", Vec::new(), Message::user("a"), Message::agent("b"))
            .await;
        assert!(matches!(saved, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn empty_user_id_is_invalid_key() {
        let store = HistoryStore::new(Arc::new(MemoryBackend::new()), &settings(20, 8000));
        assert!(matches!(store.load("", "s1").await, Err(StoreError::InvalidKey(_))));
    }
}
