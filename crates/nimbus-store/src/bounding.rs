//! History bounding: the view of a conversation that is fed to the agent.

use nimbus_core::{HistorySettings, Message};

/// Caps on the bounded history view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryLimits {
    pub max_messages: usize,
    pub max_chars: usize,
}

impl HistoryLimits {
    pub fn new(max_messages: usize, max_chars: usize) -> Self {
        Self {
            max_messages,
            max_chars,
        }
    }
}

impl From<&HistorySettings> for HistoryLimits {
    fn from(settings: &HistorySettings) -> Self {
        Self::new(settings.max_messages, settings.max_chars)
    }
}

/// Bound `messages` to the most recent window that fits both limits.
///
/// The last `max_messages` entries are considered; walking back from the
/// newest, messages are kept until adding the next one's rendered length
/// would exceed `max_chars`. The newest message is kept even if it alone exceeds the
/// budget. The result stays in chronological order.
pub fn bound_history(messages: &[Message], limits: HistoryLimits) -> Vec<Message> {
    if limits.max_messages == 0 || messages.is_empty() {
        return Vec::new();
    }
    let start = messages.len().saturating_sub(limits.max_messages);
    let window = &messages[start..];

    let mut total = 0usize;
    let mut keep = 0usize;
    for message in window.iter().rev() {
        let len = message.char_len();
        if keep > 0 && total + len > limits.max_chars {
            break;
        }
        total += len;
        keep += 1;
    }

    window[window.len() - keep..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn count_limit_keeps_most_recent() {
        let history = vec![Message::user("A"), Message::agent("B"), Message::user("C")];
        let bounded = bound_history(&history, HistoryLimits::new(2, 8000));
        assert_eq!(texts(&bounded), ["B", "C"]);
    }

    #[test]
    fn char_limit_drops_oldest_first() {
        let history = vec![Message::user("12345"), Message::agent("123456")];
        let bounded = bound_history(&history, HistoryLimits::new(20, 10));
        assert_eq!(texts(&bounded), ["123456"]);
    }

    #[test]
    fn newest_message_survives_oversized() {
        let long = "x".repeat(50);
        let history = vec![Message::user(long.clone())];
        let bounded = bound_history(&history, HistoryLimits::new(20, 10));
        assert_eq!(texts(&bounded), [long.as_str()]);
    }

    #[test]
    fn stops_at_first_overflow() {
        // "ccc" would fit after "dd" but the walk stops at "eeeeeeee".
        let history = vec![Message::user("ccc"), Message::agent("eeeeeeee"), Message::user("dd")];
        let bounded = bound_history(&history, HistoryLimits::new(20, 6));
        assert_eq!(texts(&bounded), ["dd"]);
    }

    #[test]
    fn exact_budget_fits() {
        let history = vec![Message::user("12345"), Message::agent("12345")];
        let bounded = bound_history(&history, HistoryLimits::new(20, 10));
        assert_eq!(bounded.len(), 2);
    }

    #[test]
    fn parts_only_messages_count_against_budget() {
        let payload = "x".repeat(5000);
        let history: Vec<Message> = (0..5)
            .flat_map(|i| {
                let parts = serde_json::json!([
                    {"type": "function_response", "name": "get_weather", "response": {"raw": payload}}
                ]);
                [Message::user(format!("q{i}")), Message::agent_with_parts("", parts)]
            })
            .collect();

        let bounded = bound_history(&history, HistoryLimits::new(20, 100));
        assert_eq!(bounded.len(), 1);
        assert!(bounded[0].parts.is_some());

        let small = serde_json::json!([{"type": "function_call", "name": "get_weather", "args": {}}]);
        let history = vec![
            Message::user("0123456789"),
            Message::agent_with_parts("", small),
        ];
        let bounded = bound_history(&history, HistoryLimits::new(20, 40));
        assert_eq!(bounded.len(), 1, "rendered call alone uses the budget");
    }

    #[test]
    fn zero_message_limit_is_empty() {
        let history = vec![Message::user("A")];
        assert!(bound_history(&history, HistoryLimits::new(0, 10)).is_empty());
        assert!(bound_history(&[], HistoryLimits::new(5, 10)).is_empty());
    }

    #[test]
    fn limits_from_settings() {
        let settings = HistorySettings::default();
        let limits = HistoryLimits::from(&settings);
        assert_eq!(limits, HistoryLimits::new(20, 8000));
    }
}
