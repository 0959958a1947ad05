//! Skip filter for messages that should never become card text

use insight_core::{AccumulatorConfig, EventKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// Lines made only of rule characters (`---`, `===`, `* * *`)
static SEPARATOR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[\s\-=_*#~.•]+$").ok());

/// Why a message was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    Log,
    Noise,
    Separator,
    RawJson,
    TooShort,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Log => "log",
            Self::Noise => "noise",
            Self::Separator => "separator",
            Self::RawJson => "raw-json",
            Self::TooShort => "too-short",
        }
    }
}

/// Noise rules compiled from configuration
#[derive(Debug, Clone)]
pub struct SkipFilter {
    min_chars: usize,
    noise_prefixes: Vec<String>,
    noise_phrases: Vec<String>,
    log_allow: Vec<String>,
}

impl SkipFilter {
    #[must_use]
    pub fn new(config: &AccumulatorConfig) -> Self {
        Self {
            min_chars: config.min_message_chars,
            noise_prefixes: config.noise_prefixes.clone(),
            noise_phrases: config.noise_phrases.clone(),
            log_allow: config.log_allow_markers.clone(),
        }
    }

    /// Decide whether `message` is dropped
    ///
    /// `producer` is the already resolved producer (tagged or inherited); a
    /// short chunk is kept when it has one.
    #[must_use]
    pub fn check(&self, kind: EventKind, message: &str, producer: Option<&str>) -> Option<SkipReason> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Some(SkipReason::Empty);
        }
        if kind == EventKind::Log && !self.log_allowed(trimmed, producer) {
            return Some(SkipReason::Log);
        }
        if self.noise_prefixes.iter().any(|p| trimmed.starts_with(p.as_str()))
            || self.noise_phrases.iter().any(|p| trimmed.contains(p.as_str()))
        {
            return Some(SkipReason::Noise);
        }
        if SEPARATOR.as_ref().is_some_and(|re| re.is_match(trimmed)) {
            return Some(SkipReason::Separator);
        }
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            return Some(SkipReason::RawJson);
        }
        let attributed = kind == EventKind::Chunk && producer.is_some();
        if !attributed && trimmed.chars().count() < self.min_chars {
            return Some(SkipReason::TooShort);
        }
        None
    }

    fn log_allowed(&self, message: &str, producer: Option<&str>) -> bool {
        self.log_allow.iter().any(|marker| {
            producer == Some(marker.as_str()) || message.contains(marker.as_str())
        })
    }
}

impl Default for SkipFilter {
    fn default() -> Self {
        Self::new(&AccumulatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(kind: EventKind, message: &str, producer: Option<&str>) -> Option<SkipReason> {
        SkipFilter::default().check(kind, message, producer)
    }

    #[test]
    fn drops_noise() {
        assert_eq!(check(EventKind::Chunk, "", None), Some(SkipReason::Empty));
        assert_eq!(check(EventKind::Chunk, "  \n", Some("A")), Some(SkipReason::Empty));
        assert_eq!(check(EventKind::Chunk, "INIT system", None), Some(SkipReason::Noise));
        assert_eq!(check(EventKind::Chunk, "---", Some("A")), Some(SkipReason::Noise));
        assert_eq!(check(EventKind::Chunk, "=====", Some("A")), Some(SkipReason::Separator));
        assert_eq!(
            check(EventKind::Chunk, "429 Too Many Requests from upstream", Some("A")),
            Some(SkipReason::Noise)
        );
        assert_eq!(check(EventKind::Chunk, r#"{"k": 1}"#, None), Some(SkipReason::RawJson));
    }

    #[test]
    fn logs_need_an_allow_marker() {
        assert_eq!(check(EventKind::Log, "debug info", None), Some(SkipReason::Log));
        assert_eq!(check(EventKind::Log, "weather data", Some("CheckWeather")), None);
        assert_eq!(check(EventKind::Log, "CheckWeather: 22C", None), None);
    }

    #[test]
    fn short_text_needs_a_producer() {
        assert_eq!(check(EventKind::Chunk, "hi", None), Some(SkipReason::TooShort));
        assert_eq!(check(EventKind::Chunk, "ok", Some("NewsAlert")), None);
        assert_eq!(check(EventKind::Error, "ok", Some("NewsAlert")), Some(SkipReason::TooShort));
        assert_eq!(check(EventKind::Chunk, "This is a valid message", None), None);
    }

    #[test]
    fn reason_names() {
        assert_eq!(SkipReason::RawJson.as_str(), "raw-json");
    }
}
