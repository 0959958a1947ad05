//! Line-level state machine for the agent's primary stream
//!
//! The agent may speak one of two dialects on stdout:
//! - **Framed**: `event: <kind>` followed by `data: <json>`
//! - **Plain**: free text, optionally prefixed with `Producer:`
//!
//! The first non-blank line decides. A stream that ever produces a line
//! outside the framed markers drops to plain mode for good, and from then on
//! every non-blank line is a chunk. In plain mode the last recognized
//! `Producer:` prefix sticks to the following un-prefixed lines.

use insight_core::{Event, EventKind, MessagePayload, ProducerTable};
use std::sync::Arc;
use tracing::{debug, warn};

const EVENT_MARKER: &str = "event:";
const DATA_MARKER: &str = "data:";

/// Framing state of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// No non-blank line seen yet
    Undetermined,
    Framed,
    Plain,
}

/// Stateful parser for one invocation's primary stream
#[derive(Debug)]
pub struct StreamParser {
    producers: Arc<ProducerTable>,
    mode: FramingMode,
    pending: Option<EventKind>,
    sticky: Option<String>,
}

impl StreamParser {
    #[must_use]
    pub fn new(producers: Arc<ProducerTable>) -> Self {
        Self {
            producers,
            mode: FramingMode::Undetermined,
            pending: None,
            sticky: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    /// Producer inherited by un-prefixed plain lines
    #[inline]
    #[must_use]
    pub fn sticky_producer(&self) -> Option<&str> {
        self.sticky.as_deref()
    }

    /// Feed one line (without its terminator); returns the event it completes, if any.
    pub fn feed_line(&mut self, line: &str) -> Option<Event> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        if self.mode != FramingMode::Plain {
            if let Some(marker) = trimmed.strip_prefix(EVENT_MARKER) {
                self.mode = FramingMode::Framed;
                self.pending = Some(EventKind::from_marker(marker));
                return None;
            }
            if let Some(data) = trimmed.strip_prefix(DATA_MARKER) {
                self.mode = FramingMode::Framed;
                let kind = self.pending.take().unwrap_or(EventKind::Chunk);
                return Self::frame(kind, data.trim());
            }
            debug!(previous = ?self.mode, "unframed line, switching to plain mode");
            self.mode = FramingMode::Plain;
            self.pending = None;
        }

        Some(self.plain(line))
    }

    /// A terminal frame survives a broken payload; other kinds are dropped
    fn frame(kind: EventKind, data: &str) -> Option<Event> {
        match MessagePayload::parse(data) {
            Some(payload) => {
                Some(Event::new(kind, payload.producer(), payload.display_text()).with_raw(data))
            }
            None if kind == EventKind::Done => Some(Event::done(data)),
            None => {
                warn!(%kind, len = data.len(), "dropping malformed frame payload");
                None
            }
        }
    }

    fn plain(&mut self, line: &str) -> Event {
        if let Some(producer) = self.producers.leading(line) {
            if self.sticky.as_deref() != Some(producer) {
                debug!(node = producer, "plain-text producer inferred");
                self.sticky = Some(producer.to_string());
            }
        }
        Event::chunk(self.sticky.as_deref(), format!("{line}\n")).with_raw(line)
    }
}
