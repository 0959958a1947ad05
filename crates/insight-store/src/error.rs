//! Error types for card persistence

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite failure
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Attribute map could not be (de)serialized
    #[error("attribute encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A stored row does not describe a valid card
    #[error("corrupt card row: {0}")]
    Corrupt(String),

    /// The database was written by a newer schema
    #[error("database schema {found} is newer than supported {supported}")]
    SchemaTooNew { found: i32, supported: i32 },

    /// The database worker thread is gone
    #[error("store worker unavailable")]
    WorkerGone,

    /// Filesystem failure preparing the database
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Check if the operation may succeed when repeated
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
