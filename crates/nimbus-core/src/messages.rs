use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Agent,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sender {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            other => Err(format!("unknown sender: {other}")),
        }
    }
}

/// One entry of a conversation.
///
/// `parts` carries the agent's structured output (tool calls and results)
/// and is never interpreted by the history store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<serde_json::Value>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            parts: None,
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Agent,
            text: text.into(),
            parts: None,
        }
    }

    pub fn agent_with_parts(text: impl Into<String>, parts: serde_json::Value) -> Self {
        Self {
            sender: Sender::Agent,
            text: text.into(),
            parts: Some(parts),
        }
    }

    /// The message as it appears in prompt context: `text`, or for a
    /// message with no text its `parts` joined with ` | `.
    pub fn rendered(&self) -> Cow<'_, str> {
        if !self.text.is_empty() {
            return Cow::Borrowed(&self.text);
        }
        match &self.parts {
            Some(Value::Array(parts)) => Cow::Owned(
                parts.iter().map(render_part).collect::<Vec<_>>().join(" | "),
            ),
            Some(other) => Cow::Owned(other.to_string()),
            None => Cow::Borrowed(""),
        }
    }

    /// Length of the rendered message in characters, the unit the history
    /// char budget uses.
    pub fn char_len(&self) -> usize {
        self.rendered().chars().count()
    }
}

fn render_part(part: &Value) -> String {
    match part.get("type").and_then(Value::as_str) {
        Some("text") => plain(part.get("text")),
        Some("function_call") => format!(
            "[function_call name={} args={}]",
            plain(part.get("name")),
            json(part.get("args"))
        ),
        Some("function_response") => format!(
            "[function_response name={} response={}]",
            plain(part.get("name")),
            json(part.get("response"))
        ),
        _ => match part.get("repr") {
            Some(repr) => plain(Some(repr)),
            None => part.to_string(),
        },
    }
}

fn plain(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn json(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_else(|| "null".to_string())
}

/// The stored document for one (user, session) pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub user_id: String,
    pub session_id: String,
    pub messages: Vec<Message>,
    pub last_message_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_sender: Option<Sender>,
    pub message_count: usize,
    pub last_message_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationRecord {
    /// Build a record whose denormalized fields mirror the tail of `messages`.
    pub fn from_messages(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        messages: Vec<Message>,
        written_at: DateTime<Utc>,
    ) -> Self {
        let (last_message_text, last_message_sender) = match messages.last() {
            Some(last) => (last.text.clone(), Some(last.sender)),
            None => (String::new(), None),
        };
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            message_count: messages.len(),
            messages,
            last_message_text,
            last_message_sender,
            last_message_at: written_at,
            timestamp: written_at,
        }
    }
}
