//! Insight Core - shared vocabulary of the card pipeline
//!
//! Every other crate in the workspace speaks in these types:
//! - [`Event`]: one normalized unit read from the agent process
//! - [`Card`] / [`CardDraft`]: the persisted, continuously-updated feed record
//! - [`Clock`] / [`SilenceWindow`]: the recency policy that decides whether a
//!   card is still open for extension
//! - [`InsightConfig`]: layered configuration (defaults, TOML file, environment)
//!
//! # Example
//!
//! ```rust
//! use insight_core::{Attributes, CardDraft, CardType, Priority};
//!
//! let mut attributes = Attributes::new();
//! attributes.set_title("CheckWeather");
//! attributes.set_summary("Sunny all week");
//!
//! let draft = CardDraft::new("CheckWeather", CardType::Weather, Priority::Medium, attributes);
//! assert_eq!(draft.attributes.summary(), Some("Sunny all week"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod card;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod payload;
pub mod producer;

pub use card::{attr, Attributes, Card, CardDraft, CardId, CardType, OwnerId, Priority};
pub use clock::{Clock, ManualClock, SilenceWindow, SystemClock};
pub use config::{
    AccumulatorConfig, AgentConfig, ClassifierConfig, InsightConfig, MemoryConfig,
    NotifierConfig, StoreConfig,
};
pub use error::ConfigError;
pub use event::{Event, EventKind};
pub use payload::MessagePayload;
pub use producer::ProducerTable;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with insight types
    pub use crate::{
        Attributes, Card, CardDraft, CardId, CardType, Clock, Event, EventKind, InsightConfig,
        OwnerId, Priority, ProducerTable, SilenceWindow,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
