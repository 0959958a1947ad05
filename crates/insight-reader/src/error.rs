//! Error types for running and inspecting the agent process

use std::path::PathBuf;

/// Reader errors
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// The process could not be started for a reason other than a missing binary
    #[error("failed to start agent {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stdio pipe was not handed back by the spawned child
    #[error("agent {0} pipe unavailable")]
    MissingPipe(&'static str),

    /// A stream worker panicked or was aborted
    #[error("stream worker failed: {0}")]
    Worker(String),

    /// Waiting on the child failed
    #[error("failed waiting for agent: {0}")]
    Wait(#[source] std::io::Error),

    /// Process exited unsuccessfully; reported after both streams drained
    #[error("agent exited with non-zero status ({})", exit_label(.code))]
    NonZeroExit { code: Option<i32> },

    /// `inspect` subcommand failed
    #[error("agent inspection failed: {0}")]
    Inspect(String),

    /// `inspect` output was not a manifest
    #[error("invalid inspection output: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl ReaderError {
    /// Check if a fresh run could plausibly succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NonZeroExit { .. } | Self::Worker(_))
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_display() {
        let err = ReaderError::NonZeroExit { code: Some(2) };
        assert_eq!(err.to_string(), "agent exited with non-zero status (code 2)");

        let err = ReaderError::NonZeroExit { code: None };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn retryable_classification() {
        assert!(ReaderError::NonZeroExit { code: Some(1) }.is_retryable());
        assert!(!ReaderError::MissingPipe("stdout").is_retryable());
        assert!(!ReaderError::Inspect("boom".into()).is_retryable());
    }
}
