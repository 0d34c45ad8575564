use nimbus_core::ChatError;

#[derive(Clone, Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("agent unreachable: {0}")]
    Transport(String),

    #[error("agent timed out after {0}s")]
    Timeout(u64),

    #[error("invalid agent response: {0}")]
    Decode(String),

    #[error("agent produced no response")]
    EmptyReply,

    #[error("{0}")]
    Failed(String),
}

impl AgentError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Decode(_) => "decode",
            Self::EmptyReply => "empty_reply",
            Self::Failed(_) => "failed",
        }
    }
}

impl From<AgentError> for ChatError {
    fn from(e: AgentError) -> Self {
        ChatError::AgentExecution(e.to_string())
    }
}
