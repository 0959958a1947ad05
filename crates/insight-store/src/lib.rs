//! Insight Store - where cards live and how viewers hear about them
//!
//! - [`CardStore`]: owner-scoped upsert/feed/clear with the one-open-card rule
//! - [`MemoryCardStore`]: concurrent maps, per-pair entry locking
//! - [`SqliteCardStore`]: single-connection worker thread, conditional upsert
//! - [`FeedNotifier`]: non-blocking per-owner change pulses

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod memory;
pub mod notifier;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryCardStore;
pub use notifier::{FeedNotifier, Subscription};
pub use sqlite::SqliteCardStore;
pub use store::CardStore;

use insight_core::{Clock, StoreConfig};
use std::sync::Arc;

/// Build the store selected by configuration
///
/// A configured `sqlite_path` opens (and migrates) that database; otherwise
/// cards are kept in memory for the life of the process.
///
/// # Errors
/// Returns `StoreError` if the database cannot be opened or migrated.
pub fn open_store(
    config: &StoreConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn CardStore>, StoreError> {
    let window = config.silence_window();
    match &config.sqlite_path {
        Some(path) => Ok(Arc::new(
            SqliteCardStore::open(path.clone(), window)?.with_clock(clock),
        )),
        None => Ok(Arc::new(MemoryCardStore::new(clock, window))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::{OwnerId, SystemClock};

    #[tokio::test]
    async fn factory_picks_backend() {
        let memory = open_store(&StoreConfig::default(), Arc::new(SystemClock)).unwrap();
        assert!(format!("{memory:?}").starts_with("MemoryCardStore"));

        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            sqlite_path: Some(dir.path().join("cards.db")),
            ..StoreConfig::default()
        };
        let sqlite = open_store(&config, Arc::new(SystemClock)).unwrap();
        assert!(format!("{sqlite:?}").starts_with("SqliteCardStore"));
        assert!(sqlite.get_feed(&OwnerId::new("u1"), 10).await.unwrap().is_empty());
    }
}
