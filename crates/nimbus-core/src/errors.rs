/// Errors that end a chat turn, as seen by the service boundary.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// A required request field is missing or empty. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// The document backend could not be read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The agent/tool-call step failed.
    #[error("agent execution failed: {0}")]
    AgentExecution(String),
}

impl ChatError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Short classification string for logging and the error wire format.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::AgentExecution(_) => "agent_execution_error",
        }
    }

    /// Upper-case code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::AgentExecution(_) => "AGENT_EXECUTION_ERROR",
        }
    }
}

/// Ensure a required string field is present and not blank.
pub fn require_non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str, ChatError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}
