use async_trait::async_trait;
use nimbus_core::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;

/// One agent invocation: the prompt for a single turn plus the session it
/// belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub content: String,
}

/// The agent's final response for a turn.
///
/// `parts` is the structured output (tool calls, tool results) and is passed
/// through to storage untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Value>,
}

impl AgentReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            parts: None,
        }
    }

    pub fn with_parts(text: Option<String>, parts: Value) -> Self {
        Self {
            text,
            parts: Some(parts),
        }
    }

    /// Text shown to the caller: the reply text, or the JSON of `parts` when
    /// there is no text.
    pub fn display_text(&self) -> Result<String, AgentError> {
        match (&self.text, &self.parts) {
            (Some(text), _) if !text.is_empty() => Ok(text.clone()),
            (_, Some(parts)) => Ok(parts.to_string()),
            _ => Err(AgentError::EmptyReply),
        }
    }

    /// The reply as a stored agent message.
    pub fn into_message(self) -> Message {
        let text = self.text.unwrap_or_default();
        match self.parts {
            Some(parts) => Message::agent_with_parts(text, parts),
            None => Message::agent(text),
        }
    }
}

/// The reasoning/tool-calling collaborator behind `/chat`.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, request: &AgentRequest) -> Result<AgentReply, AgentError>;
}
