//! Known producer names and their `Name:` text prefixes

use crate::config::DEFAULT_PRODUCERS;
use crate::payload::normalize_producer;

/// Ordered table of producer names recognized by their literal `Name:` prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerTable {
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    prefix: String,
}

impl ProducerTable {
    /// Build from producer names; blanks and duplicates are ignored
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<Entry> = Vec::new();
        for name in names {
            let name = normalize_producer(name.as_ref());
            if name.is_empty() || entries.iter().any(|e| e.name == name) {
                continue;
            }
            entries.push(Entry {
                prefix: format!("{name}:"),
                name,
            });
        }
        Self { entries }
    }

    /// Producer whose prefix starts the (trimmed) line
    #[must_use]
    pub fn leading(&self, line: &str) -> Option<&str> {
        let line = line.trim_start();
        self.entries
            .iter()
            .find(|e| line.starts_with(&e.prefix))
            .map(|e| e.name.as_str())
    }

    /// First producer whose prefix appears anywhere in the text, with its byte offset
    #[must_use]
    pub fn find(&self, text: &str) -> Option<(&str, usize)> {
        if let Some(name) = self.leading(text) {
            let offset = text.find(&format!("{name}:")).unwrap_or(0);
            return Some((name, offset));
        }
        self.entries
            .iter()
            .find_map(|e| text.find(&e.prefix).map(|at| (e.name.as_str(), at)))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ProducerTable {
    fn default() -> Self {
        Self::new(DEFAULT_PRODUCERS)
    }
}
