//! Error types for the pipeline
//!
//! Only a few failures ever leave a run:
//! - the agent process could not be started or exited unsuccessfully
//! - the run was cancelled before it started
//! - the feed facade could not reach the store
//!
//! Per-event problems (unparseable units, storage hiccups) are logged and
//! swallowed so the rest of the stream still becomes cards.

use insight_classifier::ImageError;
use insight_core::ConfigError;
use insight_reader::ReaderError;
use insight_store::StoreError;

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Agent process failure
    #[error("agent run failed: {0}")]
    Reader(#[from] ReaderError),

    /// Card store failure
    #[error("card store failed: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image client could not be built
    #[error("image lookup setup failed: {0}")]
    Images(#[from] ImageError),

    /// No agent definition was given and none is configured
    #[error("no agent definition configured")]
    NoAgent,

    /// Agent does not advertise a proactive schedule
    #[error("agent '{0}' has no proactive schedule")]
    NotScheduled(String),

    /// Cancelled before the agent was started
    #[error("run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Reader(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}
