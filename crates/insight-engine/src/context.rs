//! Per-run accumulation state
//!
//! A [`RunContext`] belongs to exactly one agent run. Nothing in it is shared
//! between runs: two concurrent runs for the same owner each keep their own
//! lanes, sticky producer and image choices.

use chrono::{DateTime, Utc};
use insight_classifier::{Classification, ImageRef};
use insight_core::{attr, CardId, CardType, OwnerId, Priority};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Counters of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Events handed over by the reader
    pub events: usize,
    /// Successful upserts, flushes included
    pub cards_written: usize,
    /// Events that did not become card text
    pub dropped: usize,
    /// Lanes written by the end-of-run flush
    pub flushed: usize,
    /// Error frames reported by the agent
    pub errors: usize,
    /// Upserts the store rejected
    pub store_failures: usize,
}

/// Type and styling of the last non-default classification of a lane
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Styling {
    pub(crate) card_type: CardType,
    pub(crate) priority: Priority,
    pub(crate) attributes: Vec<(&'static str, String)>,
}

impl Styling {
    const KEYS: [&'static str; 3] = [attr::CATEGORY, attr::COLOR_THEME, attr::SOURCE];

    pub(crate) fn capture(classification: &Classification) -> Self {
        Self {
            card_type: classification.card_type,
            priority: classification.priority,
            attributes: Self::KEYS
                .iter()
                .filter_map(|key| {
                    classification
                        .attributes
                        .get(key)
                        .map(|value| (*key, value.to_string()))
                })
                .collect(),
        }
    }

    pub(crate) fn restore(&self, classification: &mut Classification) {
        classification.card_type = self.card_type;
        classification.priority = self.priority;
        for (key, value) in &self.attributes {
            classification.attributes.insert(*key, value.clone());
        }
    }
}

/// Pending text of one producer
#[derive(Debug, Clone)]
pub(crate) struct NodeLane {
    pub(crate) summary: String,
    /// Bytes of the trimmed summary the store already holds
    pub(crate) saved: usize,
    pub(crate) last_touch: DateTime<Utc>,
    pub(crate) styling: Option<Styling>,
    pub(crate) card_id: Option<CardId>,
}

impl NodeLane {
    /// Lane continuing `summary`, which the store already holds
    pub(crate) fn seeded(summary: String, now: DateTime<Utc>) -> Self {
        Self {
            saved: summary.trim().len(),
            summary,
            last_touch: now,
            styling: None,
            card_id: None,
        }
    }

    /// Trimmed text, and the part of it not yet written
    pub(crate) fn pending(&self) -> (&str, &str) {
        let text = self.summary.trim();
        (text, text.get(self.saved..).unwrap_or(text))
    }
}

/// State owned by one run
#[derive(Debug)]
pub struct RunContext {
    owner: OwnerId,
    destination: String,
    pub(crate) lanes: HashMap<String, NodeLane>,
    pub(crate) images: HashMap<String, ImageRef>,
    last_active: Option<(String, DateTime<Utc>)>,
    pub(crate) stats: RunStats,
    output: String,
    done_output: Option<String>,
}

impl RunContext {
    #[must_use]
    pub fn new(owner: OwnerId, destination: impl Into<String>) -> Self {
        Self {
            owner,
            destination: destination.into(),
            lanes: HashMap::new(),
            images: HashMap::new(),
            last_active: None,
            stats: RunStats::default(),
            output: String::new(),
            done_output: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    #[inline]
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Accumulated text of a producer in this run
    #[must_use]
    pub fn summary(&self, producer: &str) -> Option<&str> {
        self.lanes.get(producer).map(|lane| lane.summary.as_str())
    }

    /// Producers that produced text, sorted
    #[must_use]
    pub fn producers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.lanes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Image chosen for a producer
    #[must_use]
    pub fn image(&self, producer: &str) -> Option<&ImageRef> {
        self.images.get(producer)
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Producer active most recently, if within `window` of `now`
    #[must_use]
    pub fn inherited_producer(&self, now: DateTime<Utc>, window: Duration) -> Option<&str> {
        let (producer, at) = self.last_active.as_ref()?;
        let elapsed = now.signed_duration_since(*at).to_std().unwrap_or_default();
        (elapsed <= window).then_some(producer.as_str())
    }

    pub(crate) fn mark_active(&mut self, producer: &str, now: DateTime<Utc>) {
        match &mut self.last_active {
            Some((current, at)) if current == producer => *at = now,
            _ => self.last_active = Some((producer.to_string(), now)),
        }
    }

    pub(crate) fn record_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub(crate) fn record_done(&mut self, output: Option<String>) {
        if output.is_some() {
            self.done_output = output;
        }
    }

    /// The agent's declared final output, else everything it displayed
    #[must_use]
    pub fn final_output(&self) -> String {
        self.done_output
            .clone()
            .unwrap_or_else(|| self.output.clone())
    }
}
