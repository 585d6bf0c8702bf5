use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for cataloging, splitting, and manifest persistence failures.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("source directory '{}' does not exist", path.display())]
    MissingDirectory { path: PathBuf },
    #[error("safety metadata file '{}' does not exist", path.display())]
    MissingSafetyMetadata { path: PathBuf },
    #[error("no files matching '{pattern}' found in '{}'", dir.display())]
    NoMatchingFiles { dir: PathBuf, pattern: String },
    #[error("unparseable file name '{name}': {reason}")]
    InvalidFileName { name: String, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("split invariant violated: {0}")]
    InvariantViolation(String),
    #[error("manifest '{}' is malformed: {details}", path.display())]
    Manifest { path: PathBuf, details: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IndexError {
    /// True for misconfiguration errors that must abort the run before any write.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            IndexError::MissingDirectory { .. }
                | IndexError::MissingSafetyMetadata { .. }
                | IndexError::NoMatchingFiles { .. }
        )
    }

    /// True for per-record failures that are logged and skipped.
    pub fn is_skippable(&self) -> bool {
        matches!(self, IndexError::InvalidFileName { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers_split_fatal_and_skippable() {
        let missing = IndexError::MissingDirectory {
            path: PathBuf::from("/nowhere"),
        };
        assert!(missing.is_precondition());
        assert!(!missing.is_skippable());

        let bad_name = IndexError::InvalidFileName {
            name: "junk.wav".into(),
            reason: "no segment token".into(),
        };
        assert!(bad_name.is_skippable());
        assert!(!bad_name.is_precondition());

        let invariant = IndexError::InvariantViolation("boom".into());
        assert!(!invariant.is_precondition());
        assert!(!invariant.is_skippable());
    }

    #[test]
    fn display_includes_paths_and_patterns() {
        let err = IndexError::NoMatchingFiles {
            dir: PathBuf::from("/data/train_1"),
            pattern: "*.3.wav".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("*.3.wav"));
        assert!(rendered.contains("/data/train_1"));
    }
}
