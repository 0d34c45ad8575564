use std::sync::Arc;

use nimbus_agent::{build_prompt, Agent, AgentRequest};
use nimbus_core::errors::require_non_empty;
use nimbus_core::ids::{RequestId, SessionId};
use nimbus_core::{ChatError, Message};
use nimbus_store::HistoryStore;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{ChatRequest, ChatResponse};

/// One chat turn: load history, ask the agent, save the turn.
pub struct ChatService {
    app_name: String,
    history: HistoryStore,
    agent: Arc<dyn Agent>,
}

impl ChatService {
    pub fn new(app_name: impl Into<String>, history: HistoryStore, agent: Arc<dyn Agent>) -> Self {
        Self {
            app_name: app_name.into(),
            history,
            agent,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub async fn handle_chat(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let user_id = require_non_empty(&request.user_id, "user_id")?;
        require_non_empty(&request.query, "query")?;
        let session_id = SessionId::resolve(request.session_id.as_deref());
        self.run_query(user_id, session_id.as_str(), &request.query).await
    }

    /// A failed load or agent call ends the turn. A failed save does not:
    /// the reply is still returned and the failure is logged.
    #[instrument(
        name = "run_query",
        skip_all,
        fields(user_id = %user_id, session_id = %session_id, request_id = %RequestId::new())
    )]
    async fn run_query(
        &self,
        user_id: &str,
        session_id: &str,
        query: &str,
    ) -> Result<ChatResponse, ChatError> {
        let history = self.history.load(user_id, session_id).await.map_err(|e| {
            warn!(error = %e, "failed to load conversation");
            ChatError::from(e)
        })?;

        let request = AgentRequest {
            app_name: self.app_name.clone(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            content: build_prompt(&history, query),
        };
        let reply = self.agent.run(&request).await.map_err(|e| {
            warn!(agent = self.agent.name(), error = %e, kind = e.error_kind(), "agent call failed");
            ChatError::from(e)
        })?;
        let response = reply.display_text()?;

        match self
            .history
            .append_and_save(user_id, session_id, history, Message::user(query), reply.into_message())
            .await
        {
            Ok(record) => debug!(message_count = record.message_count, "conversation saved"),
            Err(e) => error!(
                session_id = %session_id,
                user_id = %user_id,
                error = %e,
                "failed to save conversation"
            ),
        }

        info!("chat turn complete");
        Ok(ChatResponse {
            response,
            session_id: session_id.to_string(),
        })
    }
}
