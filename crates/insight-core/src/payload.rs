//! JSON payload carried by agent frames
//!
//! Agents are inconsistent about field names: the producer may arrive as
//! `node` or `node_name`, and the text as `text` or `message`. Some agents
//! also nest a `{"text": ...}` object inside `message` as a string.

use serde::Deserialize;

/// The `data:` payload of a framed agent event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Final output of a terminal `done` frame.
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Deserialize)]
struct NestedText {
    #[serde(default)]
    text: String,
}

impl MessagePayload {
    /// Parse a payload, returning `None` for anything that is not a JSON object.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw.trim()).ok()
    }

    /// Producer identity, `node` preferred over `node_name`.
    #[must_use]
    pub fn producer(&self) -> Option<String> {
        [self.node.as_deref(), self.node_name.as_deref()]
            .into_iter()
            .flatten()
            .map(normalize_producer)
            .find(|node| !node.is_empty())
    }

    /// Text meant for display: explicit `text` wins over the generic `message`.
    #[must_use]
    pub fn display_text(&self) -> String {
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            return text.to_string();
        }
        let Some(message) = self.message.as_deref() else {
            return String::new();
        };
        match serde_json::from_str::<NestedText>(message) {
            Ok(nested) if !nested.text.is_empty() => nested.text,
            _ => message.to_string(),
        }
    }
}

/// Trim whitespace and a trailing colon (`"Guardian Assistant:"` → `"Guardian Assistant"`).
#[must_use]
pub fn normalize_producer(node: &str) -> String {
    node.trim().trim_end_matches(':').trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_preferred_over_message() {
        let payload =
            MessagePayload::parse(r#"{"node":"GeniusLoci","message":"generic","text":"display"}"#)
                .unwrap();
        assert_eq!(payload.display_text(), "display");
    }

    #[test]
    fn message_used_when_text_missing() {
        let payload = MessagePayload::parse(r#"{"message":"Hello World"}"#).unwrap();
        assert_eq!(payload.display_text(), "Hello World");
    }

    #[test]
    fn nested_text_inside_message_is_unwrapped() {
        let payload = MessagePayload::parse(r#"{"message":"{\"text\": \"Inner Text\"}"}"#).unwrap();
        assert_eq!(payload.display_text(), "Inner Text");
    }

    #[test]
    fn producer_falls_back_to_node_name() {
        let payload = MessagePayload::parse(r#"{"node":"","node_name":"CheckWeather"}"#).unwrap();
        assert_eq!(payload.producer().as_deref(), Some("CheckWeather"));
    }

    #[test]
    fn producer_strips_trailing_colon() {
        let payload = MessagePayload::parse(r#"{"node":"Guardian Assistant:"}"#).unwrap();
        assert_eq!(payload.producer().as_deref(), Some("Guardian Assistant"));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(MessagePayload::parse("invalid").is_none());
        assert!(MessagePayload::parse("[1,2]").is_none());
    }
}
