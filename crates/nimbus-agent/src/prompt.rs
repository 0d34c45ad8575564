//! Prompt context assembly: prior turns rendered ahead of the new query.

use nimbus_core::Message;

/// Build the agent prompt for `query` given the bounded history.
///
/// Each line is the message's [`Message::rendered`] form, the same text the
/// history char budget is charged against.
pub fn build_prompt(history: &[Message], query: &str) -> String {
    if history.is_empty() {
        return query.to_string();
    }

    let mut out = String::from("History:\n");
    for (i, message) in history.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(message.sender.as_str());
        out.push_str(": ");
        out.push_str(&message.rendered());
    }
    out.push_str("\n\nUser: ");
    out.push_str(query);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_history_is_bare_query() {
        assert_eq!(build_prompt(&[], "Weather in Oslo?"), "Weather in Oslo?");
    }

    #[test]
    fn history_is_prefixed() {
        let history = vec![Message::user("hi"), Message::agent("hello")];
        assert_eq!(
            build_prompt(&history, "Weather in Oslo?"),
            "History:\nuser: hi\nagent: hello\n\nUser: Weather in Oslo?"
        );
    }

    #[test]
    fn structured_parts_are_rendered() {
        let parts = json!([
            {"type": "function_call", "name": "get_city_weather_and_time", "args": {"city": "Oslo"}},
            {"type": "function_response", "name": "get_city_weather_and_time", "response": {"temp": 3}},
            {"type": "text", "text": "It is 3 degrees"},
            {"type": "unknown", "repr": "<blob>"}
        ]);
        let history = vec![Message::agent_with_parts("", parts)];
        assert_eq!(
            build_prompt(&history, "thanks"),
            "History:\nagent: [function_call name=get_city_weather_and_time args={\"city\":\"Oslo\"}] | \
             [function_response name=get_city_weather_and_time response={\"temp\":3}] | \
             It is 3 degrees | <blob>\n\nUser: thanks"
        );
    }

    #[test]
    fn text_wins_over_parts() {
        let history = vec![Message::agent_with_parts("sunny", json!([{"type": "text", "text": "ignored"}]))];
        assert_eq!(build_prompt(&history, "q"), "History:\nagent: sunny\n\nUser: q");
    }

    #[test]
    fn untyped_part_falls_back_to_json() {
        let history = vec![Message::agent_with_parts("", json!([{"kind": "image"}]))];
        assert_eq!(build_prompt(&history, "q"), "History:\nagent: {\"kind\":\"image\"}\n\nUser: q");
    }
}
