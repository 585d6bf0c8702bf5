//! Safety metadata registry.
//!
//! The table lists one recording per row as `<id>,<class>,<safe>` after a header
//! row. Lookups are closed-world: ids missing from the table are unsafe.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::catalog::{Label, recording_id};
use crate::constants::manifest::FIELD_DELIMITER;
use crate::constants::safety::{DEFAULT_SAFETY_FILENAME, SAFE_FLAG, SKIP_MALFORMED_ROW_MSG};
use crate::errors::IndexError;
use crate::types::RecordingId;

/// One registry row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SafetyEntry {
    /// True when the recording may be used for training/validation.
    pub safe: bool,
    /// Class recorded alongside the flag, when it is a valid label.
    pub class: Option<Label>,
}

/// Recording id → safety flag lookup.
#[derive(Clone, Debug, Default)]
pub struct SafetyRegistry {
    entries: HashMap<RecordingId, SafetyEntry>,
}

impl SafetyRegistry {
    /// Location of the default table for a subject directory: its parent directory.
    pub fn default_path_for(subject_dir: &Path) -> PathBuf {
        Self::path_for(subject_dir, DEFAULT_SAFETY_FILENAME)
    }

    /// Location of `file_name` next to `subject_dir`.
    pub fn path_for(subject_dir: &Path, file_name: &str) -> PathBuf {
        subject_dir
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(file_name)
    }

    /// Load the table at `path`; a missing file is a precondition failure.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        if !path.is_file() {
            return Err(IndexError::MissingSafetyMetadata {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path)?;
        let registry = Self::parse(&text);
        debug!(
            path = %path.display(),
            entries = registry.len(),
            safe = registry.safe_count(),
            "loaded safety metadata"
        );
        Ok(registry)
    }

    /// Parse table text; the first line is a header.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        for (line_no, line) in text.lines().enumerate().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();
            if fields.len() < 3 || fields[0].is_empty() {
                warn!(line = line_no + 1, row = %line, "{}", SKIP_MALFORMED_ROW_MSG);
                continue;
            }
            entries.insert(
                recording_id(fields[0]).to_string(),
                SafetyEntry {
                    safe: fields[2] == SAFE_FLAG,
                    class: Label::parse(fields[1]),
                },
            );
        }
        Self { entries }
    }

    /// Build a registry from explicit `(id, entry)` pairs.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, SafetyEntry)>,
        K: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(id, entry)| (recording_id(id.as_ref()).to_string(), entry))
                .collect(),
        }
    }

    /// True only for ids present in the table and flagged safe.
    pub fn is_safe(&self, file_name: &str) -> bool {
        self.entry(file_name).map(|entry| entry.safe).unwrap_or(false)
    }

    /// Registry row for the recording behind `file_name`.
    pub fn entry(&self, file_name: &str) -> Option<&SafetyEntry> {
        self.entries.get(recording_id(file_name))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table had no usable rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn safe_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.safe).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::capture_logs;
    use tempfile::tempdir;

    const TABLE: &str = "image,class,safe\n\
        1_1_0.mat,0,1\n\
        1_2_0.mat,0,0\n\
        1_1_1.mat,1,1\n\
        1_7.mat,1,1\n\
        broken_row\n\
        \n\
        1_9_0.mat,0,yes\n";

    #[test]
    fn parse_skips_header_and_malformed_rows() {
        let registry = SafetyRegistry::parse(TABLE);
        assert_eq!(registry.len(), 5);
        assert!(registry.is_safe("1_1_0.3.wav"));
        assert!(!registry.is_safe("1_2_0.3.wav"));
        assert!(registry.is_safe("1_1_1.mat"));
        assert!(!registry.is_safe("1_9_0.0.wav"));
    }

    #[test]
    fn malformed_row_warning_reads_as_a_message() {
        let (registry, logs) =
            capture_logs(|| SafetyRegistry::parse("id,class,safe\nbroken_row\n1_1_0.mat,0,1\n"));
        assert_eq!(registry.len(), 1);
        assert!(logs.contains(SKIP_MALFORMED_ROW_MSG));
        assert!(logs.contains("broken_row"));
        assert!(!logs.contains("SKIP_MALFORMED_ROW_MSG"));
    }

    #[test]
    fn unknown_ids_default_to_unsafe() {
        let registry = SafetyRegistry::parse(TABLE);
        assert!(!registry.is_safe("2_1_0.0.wav"));
        assert!(registry.entry("2_1_0.0.wav").is_none());
        assert!(!SafetyRegistry::default().is_safe("1_1_0.0.wav"));
    }

    #[test]
    fn class_field_is_kept_when_valid() {
        let registry = SafetyRegistry::parse("id,class,safe\n1_7.mat,1,1\n1_8.mat,?,1\n");
        assert_eq!(registry.entry("1_7.4.wav").unwrap().class, Some(Label::Positive));
        assert_eq!(registry.entry("1_8.4.wav").unwrap().class, None);
    }

    #[test]
    fn load_requires_existing_file() {
        let temp = tempdir().unwrap();
        let subject_dir = temp.path().join("train_1");
        let path = SafetyRegistry::default_path_for(&subject_dir);
        assert_eq!(path, temp.path().join(DEFAULT_SAFETY_FILENAME));

        let err = SafetyRegistry::load(&path).unwrap_err();
        assert!(matches!(err, IndexError::MissingSafetyMetadata { .. }));
        assert!(err.is_precondition());

        fs::write(&path, TABLE).unwrap();
        let registry = SafetyRegistry::load(&path).unwrap();
        assert!(registry.is_safe("1_1_0.0.wav"));
    }

    #[test]
    fn from_entries_normalizes_ids() {
        let registry = SafetyRegistry::from_entries([(
            "1_3_1.mat",
            SafetyEntry {
                safe: true,
                class: Some(Label::Positive),
            },
        )]);
        assert!(registry.is_safe("1_3_1.12.wav"));
        assert!(!registry.is_empty());
    }
}
