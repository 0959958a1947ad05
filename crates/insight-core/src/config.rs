//! Layered configuration
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! environment overrides. Every section deserializes with defaults so a file
//! only needs the keys it changes:
//!
//! ```toml
//! [store]
//! silence_window_secs = 120
//!
//! [accumulator]
//! min_message_chars = 4
//! ```

use crate::clock::SilenceWindow;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Producers whose `Name:` prefix the agent prints in plain-text mode
pub const DEFAULT_PRODUCERS: &[&str] = &[
    "NewsAlert",
    "CheckWeather",
    "KnowledgeCheck",
    "ReviewSummarizer",
    "GeniusLoci",
    "GenerateReport",
];

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Known producer names, shared by prefix inference and classification
    pub producers: Vec<String>,
    pub agent: AgentConfig,
    pub accumulator: AccumulatorConfig,
    pub classifier: ClassifierConfig,
    pub store: StoreConfig,
    pub notifier: NotifierConfig,
}

impl InsightConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load defaults, an optional TOML file, and process environment overrides
    ///
    /// # Errors
    /// - `ConfigError::Io` / `ConfigError::Parse` for an unreadable file
    /// - `ConfigError::Env` for an unusable override
    /// - `ConfigError::Invalid` when validation fails
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "loading configuration file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            if value.is_some() {
                debug!(key, "environment override");
            }
            value
        };

        if let Some(bin) = non_empty("INSIGHT_AGENT_BIN") {
            self.agent.binary = Some(PathBuf::from(bin));
        }
        if let Some(agent) = non_empty("INSIGHT_DEFAULT_AGENT") {
            self.agent.default_agent = Some(PathBuf::from(agent));
        }
        if let Some(raw) = non_empty("INSIGHT_SILENCE_WINDOW_SECS") {
            self.store.silence_window_secs = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::env("INSIGHT_SILENCE_WINDOW_SECS", raw.clone()))?;
        }
        if let Some(path) = non_empty("INSIGHT_DB_PATH") {
            self.store.sqlite_path = Some(PathBuf::from(path));
        }
        if let Some(key) = non_empty("UNSPLASH_ACCESS_KEY") {
            self.classifier.unsplash_access_key = Some(key);
        }
        if let Some(project_id) = non_empty("VERTEX_PROJECT_ID") {
            self.agent.memory = Some(MemoryConfig {
                enabled: true,
                project_id: Some(project_id),
                location: non_empty("VERTEX_LOCATION"),
                corpus_name: non_empty("VERTEX_CORPUS_NAME"),
                ..MemoryConfig::default()
            });
        }
        Ok(())
    }

    /// Reject values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.silence_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "store.silence_window_secs must be positive".into(),
            ));
        }
        if self.store.feed_page_size == 0 {
            return Err(ConfigError::Invalid("store.feed_page_size must be positive".into()));
        }
        if self.notifier.slot_capacity == 0 {
            return Err(ConfigError::Invalid("notifier.slot_capacity must be positive".into()));
        }
        if self.agent.event_buffer == 0 {
            return Err(ConfigError::Invalid("agent.event_buffer must be positive".into()));
        }
        if self.classifier.image_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "classifier.image_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// With a silence window
    #[inline]
    #[must_use]
    pub fn with_silence_window(mut self, window: Duration) -> Self {
        self.store.silence_window_secs = window.as_secs().max(1);
        self
    }

    /// With an explicit agent binary
    #[inline]
    #[must_use]
    pub fn with_agent_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.agent.binary = Some(binary.into());
        self
    }

    /// Prefix table built from [`Self::producers`]
    #[must_use]
    pub fn producer_table(&self) -> crate::ProducerTable {
        crate::ProducerTable::new(&self.producers)
    }

    /// With a replacement producer table
    #[must_use]
    pub fn with_producers<I, S>(mut self, producers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.producers = producers.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            producers: DEFAULT_PRODUCERS.iter().map(|p| (*p).to_string()).collect(),
            agent: AgentConfig::default(),
            accumulator: AccumulatorConfig::default(),
            classifier: ClassifierConfig::default(),
            store: StoreConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

/// External agent process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Explicit binary; skips discovery when set
    pub binary: Option<PathBuf>,
    /// Discovery candidates, first existing path wins
    pub candidates: Vec<PathBuf>,
    /// Agent definition used when a run does not name one
    pub default_agent: Option<PathBuf>,
    pub memory: Option<MemoryConfig>,
    /// Capacity of the reader → accumulator event channel
    pub event_buffer: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary: None,
            candidates: vec![
                PathBuf::from("./installer/linux/fastgraph"),
                PathBuf::from("./installer/windows-amd64/fastgraph.exe"),
                PathBuf::from("./fastgraph"),
                PathBuf::from("./fastgraph.exe"),
            ],
            default_agent: None,
            memory: None,
            event_buffer: 256,
        }
    }
}

/// Agent memory/retrieval layer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    /// Backing store name, e.g. `inmemory` or `vertex`
    pub store: String,
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub corpus_name: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            store: "inmemory".to_string(),
            project_id: None,
            location: None,
            corpus_name: None,
        }
    }
}

/// Accumulation engine filters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorConfig {
    /// Messages shorter than this (in chars, trimmed) are noise unless attributed
    pub min_message_chars: usize,
    /// How long an untagged chunk may inherit the last active producer
    pub inherit_window_secs: u64,
    /// Messages starting with any of these are dropped
    pub noise_prefixes: Vec<String>,
    /// Messages containing any of these are dropped
    pub noise_phrases: Vec<String>,
    /// Producers that never reach end users
    pub utility_nodes: Vec<String>,
    /// Markers that let a diagnostic line through
    pub log_allow_markers: Vec<String>,
}

impl AccumulatorConfig {
    #[must_use]
    pub fn inherit_window(&self) -> Duration {
        Duration::from_secs(self.inherit_window_secs)
    }
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            min_message_chars: 3,
            inherit_window_secs: 120,
            noise_prefixes: strings(&["INIT", "---", "DEBUG", "Traceback"]),
            noise_phrases: strings(&[
                "RESOURCE_EXHAUSTED",
                "429 Too Many Requests",
                "binary not found",
                "[DONE]",
                "\"type\": \"log\"",
            ]),
            utility_nodes: strings(&["Guardian Assistant", "__start__", "__end__", "Router"]),
            log_allow_markers: strings(&["CheckWeather"]),
        }
    }
}

/// Classifier and image lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Upper bound on one image lookup
    pub image_timeout_ms: u64,
    /// Unsplash credential; image lookup is disabled without it
    pub unsplash_access_key: Option<String>,
    pub image_cache_ttl_secs: u64,
    pub image_cache_capacity: u64,
}

impl ClassifierConfig {
    #[must_use]
    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            image_timeout_ms: 5_000,
            unsplash_access_key: None,
            image_cache_ttl_secs: 60 * 60,
            image_cache_capacity: 256,
        }
    }
}

/// Card store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub silence_window_secs: u64,
    pub feed_page_size: usize,
    /// SQLite database; the in-memory store is used when unset
    pub sqlite_path: Option<PathBuf>,
}

impl StoreConfig {
    #[must_use]
    pub fn silence_window(&self) -> SilenceWindow {
        SilenceWindow::from_secs(self.silence_window_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            silence_window_secs: 60 * 60,
            feed_page_size: 50,
            sqlite_path: None,
        }
    }
}

/// Update notifier settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Pending pulses per subscription before new ones are dropped
    pub slot_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self { slot_capacity: 1 }
    }
}
