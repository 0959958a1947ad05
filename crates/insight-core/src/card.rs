//! Feed cards and their identifiers
//!
//! A [`Card`] is the user-visible record synthesized from one producer's
//! output. Its serialized form is the storage/wire contract:
//!
//! ```text
//! {id, card_type, priority, source_node, timestamp, data: {title, summary, ...}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Well-known attribute keys
pub mod attr {
    pub const SUMMARY: &str = "summary";
    pub const TITLE: &str = "title";
    pub const CATEGORY: &str = "category";
    pub const COLOR_THEME: &str = "colorTheme";
    pub const SOURCE: &str = "source";
    pub const IMAGE_URL: &str = "imageUrl";
    pub const IMAGE_USER: &str = "imageUser";
    pub const IMAGE_USER_LINK: &str = "imageUserLink";
    pub const NODE: &str = "node";
    pub const MESSAGE: &str = "message";
    pub const LEVEL: &str = "level";
    pub const DESCRIPTION: &str = "description";
    pub const TEMP: &str = "temp";
    pub const LOCATION: &str = "location";
    pub const CONDITION: &str = "condition";
}

/// Unique card identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId(pub Ulid);

impl CardId {
    /// Generate new card ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CardId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Feed owner (viewer, device or session); the multi-tenant partition key
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Owner used by scheduled background runs
    pub const BROADCAST: &'static str = "system_broadcast";

    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Owner for proactive runs nobody asked for
    #[must_use]
    pub fn broadcast() -> Self {
        Self::new(Self::BROADCAST)
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OwnerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Card category vocabulary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardType {
    #[default]
    Article,
    Weather,
    SafetyAlert,
    CulturalTip,
}

impl CardType {
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Weather => "weather",
            Self::SafetyAlert => "safety-alert",
            Self::CulturalTip => "cultural-tip",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(Self::Article),
            "weather" => Ok(Self::Weather),
            "safety-alert" => Ok(Self::SafetyAlert),
            "cultural-tip" => Ok(Self::CulturalTip),
            other => Err(format!("unknown card type '{other}'")),
        }
    }
}

/// Card priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Open, string-keyed presentation attributes of a card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.get(attr::SUMMARY)
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.insert(attr::SUMMARY, summary);
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get(attr::TITLE)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.insert(attr::TITLE, title);
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.get(attr::IMAGE_URL)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// What the pipeline hands to the store; the store assigns identity and time.
///
/// `attributes` carries the writer's full view of the summary, used when a
/// new card starts. `append` is the text the writer added since its last
/// successful write; extending an open card appends it to the stored summary
/// instead, so concurrent writers of one pair never overwrite each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDraft {
    pub source_node: String,
    pub card_type: CardType,
    pub priority: Priority,
    pub attributes: Attributes,
    pub append: Option<String>,
}

impl CardDraft {
    #[must_use]
    pub fn new(
        source_node: impl Into<String>,
        card_type: CardType,
        priority: Priority,
        attributes: Attributes,
    ) -> Self {
        Self {
            source_node: source_node.into(),
            card_type,
            priority,
            attributes,
            append: None,
        }
    }

    /// Extend open cards by `delta` rather than replacing their summary
    #[must_use]
    pub fn with_append(mut self, delta: impl Into<String>) -> Self {
        self.append = Some(delta.into());
        self
    }

    /// Materialize as a brand-new card
    #[must_use]
    pub fn into_card(self, owner: OwnerId, now: DateTime<Utc>) -> Card {
        Card {
            id: CardId::new(),
            owner,
            card_type: self.card_type,
            priority: self.priority,
            source_node: self.source_node,
            updated_at: now,
            attributes: self.attributes,
        }
    }
}

/// Persisted feed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    #[serde(skip)]
    pub owner: OwnerId,
    pub card_type: CardType,
    pub priority: Priority,
    pub source_node: String,
    #[serde(rename = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "data")]
    pub attributes: Attributes,
}

impl Card {
    /// Overwrite the mutable parts from a newer draft of the same producer
    ///
    /// With an `append` delta the stored summary only grows; without one the
    /// draft's summary replaces it.
    pub fn apply(&mut self, draft: CardDraft, now: DateTime<Utc>) {
        let grown = draft
            .append
            .map(|delta| format!("{}{delta}", self.summary()));
        self.card_type = draft.card_type;
        self.priority = draft.priority;
        self.attributes = draft.attributes;
        if let Some(summary) = grown {
            self.attributes.set_summary(summary);
        }
        self.updated_at = now;
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        self.attributes.summary().unwrap_or_default()
    }
}
