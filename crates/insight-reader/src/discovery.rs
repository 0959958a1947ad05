//! Agent binary discovery

use std::path::{Path, PathBuf};

/// First candidate that exists as a file; an explicit path always wins.
#[must_use]
pub fn discover_binary(explicit: Option<&Path>, candidates: &[PathBuf]) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    candidates.iter().find(|c| c.is_file()).cloned()
}

/// Like [`discover_binary`], but falls back to the last candidate so a run
/// still degrades to the missing-binary log event instead of failing early.
#[must_use]
pub fn resolve_binary(explicit: Option<&Path>, candidates: &[PathBuf]) -> PathBuf {
    discover_binary(explicit, candidates).unwrap_or_else(|| {
        tracing::warn!(candidates = candidates.len(), "no agent binary found");
        candidates
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("fastgraph"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins_even_if_missing() {
        let found = discover_binary(Some(Path::new("/nope/bin")), &[]);
        assert_eq!(found, Some(PathBuf::from("/nope/bin")));
    }

    #[test]
    fn first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("second");
        let third = dir.path().join("third");
        std::fs::write(&second, b"").unwrap();
        std::fs::write(&third, b"").unwrap();

        let candidates = vec![dir.path().join("first"), second.clone(), third];
        assert_eq!(discover_binary(None, &candidates), Some(second));
    }

    #[test]
    fn directories_are_not_binaries() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(discover_binary(None, &[dir.path().to_path_buf()]), None);
    }

    #[test]
    fn resolve_falls_back_to_last_candidate() {
        let candidates = vec![PathBuf::from("/nope/a"), PathBuf::from("/nope/b")];
        assert_eq!(resolve_binary(None, &candidates), PathBuf::from("/nope/b"));
    }
}
