//! Normalized events read from the agent process

use crate::payload::MessagePayload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a normalized event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Producer output (framed data or a plain-text line)
    Chunk,
    /// Diagnostic stream line
    Log,
    /// Terminal marker of a run
    Done,
    /// Error frame reported by the agent
    Error,
}

impl EventKind {
    /// Map an `event: <kind>` marker to a kind; unknown kinds are treated as chunks.
    #[must_use]
    pub fn from_marker(marker: &str) -> Self {
        match marker.trim() {
            "done" | "end" => Self::Done,
            "error" => Self::Error,
            "log" => Self::Log,
            _ => Self::Chunk,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chunk => "chunk",
            Self::Log => "log",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical unit of agent output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Producer identity, when the agent tagged the unit
    pub node: Option<String>,
    /// Resolved display text
    pub text: String,
    /// The line or payload as received
    pub raw: String,
}

impl Event {
    /// Create a new event
    #[must_use]
    pub fn new(kind: EventKind, node: Option<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind,
            node: node.filter(|n| !n.is_empty()),
            raw: text.clone(),
            text,
        }
    }

    /// Producer output
    #[must_use]
    pub fn chunk(node: Option<&str>, text: impl Into<String>) -> Self {
        Self::new(EventKind::Chunk, node.map(str::to_string), text)
    }

    /// Diagnostic line
    #[must_use]
    pub fn log(text: impl Into<String>) -> Self {
        Self::new(EventKind::Log, None, text)
    }

    /// Terminal marker carrying its raw payload
    #[must_use]
    pub fn done(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let text = MessagePayload::parse(&raw)
            .map(|p| p.display_text())
            .unwrap_or_default();
        Self {
            kind: EventKind::Done,
            node: None,
            text,
            raw,
        }
    }

    /// Replace the raw text
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    /// Display text, recovering it from the raw payload when the reader left it empty.
    #[must_use]
    pub fn display_text(&self) -> String {
        if !self.text.is_empty() {
            return self.text.clone();
        }
        MessagePayload::parse(&self.raw)
            .map(|p| p.display_text())
            .unwrap_or_default()
    }

    /// The `output` field of a terminal payload, if any.
    #[must_use]
    pub fn done_output(&self) -> Option<String> {
        if self.kind != EventKind::Done {
            return None;
        }
        MessagePayload::parse(&self.raw).and_then(|p| p.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_mapping() {
        assert_eq!(EventKind::from_marker("chunk"), EventKind::Chunk);
        assert_eq!(EventKind::from_marker("done"), EventKind::Done);
        assert_eq!(EventKind::from_marker(" error "), EventKind::Error);
        assert_eq!(EventKind::from_marker("node_update"), EventKind::Chunk);
    }

    #[test]
    fn empty_node_is_dropped() {
        let event = Event::chunk(Some(""), "text");
        assert!(event.node.is_none());
    }

    #[test]
    fn done_keeps_unparseable_raw() {
        let event = Event::done("not json at all");
        assert_eq!(event.kind, EventKind::Done);
        assert_eq!(event.raw, "not json at all");
        assert!(event.text.is_empty());
        assert!(event.done_output().is_none());
    }

    #[test]
    fn done_output_extracted() {
        let event = Event::done(r#"{"output": "full report"}"#);
        assert_eq!(event.done_output().as_deref(), Some("full report"));
    }

    #[test]
    fn display_text_recovers_from_raw() {
        let event = Event::new(EventKind::Chunk, None, "").with_raw(r#"{"text":"from raw"}"#);
        assert_eq!(event.display_text(), "from raw");
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&EventKind::Done).unwrap();
        assert_eq!(json, "\"done\"");
    }
}
