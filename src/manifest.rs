//! Index manifest encoding.
//!
//! A manifest is a header row `filename,label` followed by one row per
//! (possibly repeated) selected file. Writes go through a temporary file in the
//! destination directory and are renamed into place, so a manifest that exists
//! is always complete.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::catalog::CatalogEntry;
use crate::constants::manifest::{FIELD_DELIMITER, MANIFEST_HEADER, MANIFEST_SUFFIX};
use crate::errors::IndexError;
use crate::types::{Electrode, FileName, SubjectId};

/// Named manifest sets consumed by the training pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetName {
    /// Training portion of a validation split.
    Tain,
    /// Held-back portion of a validation split.
    Eval,
    /// Every training recording, no validation split.
    Full,
    /// Held-out recordings with unknown labels.
    Test,
}

impl SetName {
    /// Set consumed by a loader running with the given flags.
    pub fn for_mode(training: bool, validate_mode: bool) -> Self {
        match (training, validate_mode) {
            (true, true) => SetName::Tain,
            (true, false) => SetName::Full,
            (false, true) => SetName::Eval,
            (false, false) => SetName::Test,
        }
    }

    /// Name used in manifest file names.
    pub fn as_str(self) -> &'static str {
        match self {
            SetName::Tain => "tain",
            SetName::Eval => "eval",
            SetName::Full => "full",
            SetName::Test => "test",
        }
    }

    /// True for sets drawn from the held-out tree.
    pub fn is_held_out(self) -> bool {
        matches!(self, SetName::Test)
    }

    /// True for sets that feed model training.
    pub fn is_training(self) -> bool {
        matches!(self, SetName::Tain | SetName::Full)
    }

    /// True for sets built from a train/validation split.
    pub fn is_validation_split(self) -> bool {
        matches!(self, SetName::Tain | SetName::Eval)
    }
}

impl fmt::Display for SetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manifest file name for one (set, subject, electrode) tuple.
///
/// Example: `tain-1-3-index.csv`
pub fn manifest_file_name(set: SetName, subject: SubjectId, electrode: Electrode) -> String {
    format!("{set}-{subject}-{electrode}{MANIFEST_SUFFIX}")
}

/// One manifest row.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ManifestRow {
    /// Basename or manifest-relative path.
    pub file_name: FileName,
    /// `0` or `1`.
    pub label: u8,
}

impl ManifestRow {
    /// Row with an explicit label.
    pub fn new(file_name: impl Into<FileName>, label: u8) -> Self {
        Self {
            file_name: file_name.into(),
            label,
        }
    }

    /// Row for a cataloged file, using its parsed (or placeholder) label.
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        Self::new(entry.file_name.clone(), entry.key.manifest_label())
    }
}

/// Write `rows` to `path`, replacing any previous file atomically.
pub fn write_manifest(path: &Path, rows: &[ManifestRow]) -> Result<(), IndexError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let staged = NamedTempFile::new_in(&dir)?;
    {
        let mut out = BufWriter::new(staged.as_file());
        writeln!(out, "{MANIFEST_HEADER}")?;
        for row in rows {
            writeln!(out, "{}{FIELD_DELIMITER}{}", row.file_name, row.label)?;
        }
        out.flush()?;
    }
    staged.persist(path).map_err(|err| err.error)?;
    debug!(path = %path.display(), rows = rows.len(), "wrote manifest");
    Ok(())
}

/// Read a manifest written by [`write_manifest`].
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestRow>, IndexError> {
    let text = fs::read_to_string(path)?;
    let malformed = |details: String| IndexError::Manifest {
        path: path.to_path_buf(),
        details,
    };
    let mut lines = text.lines();
    match lines.next() {
        Some(header) if header.trim() == MANIFEST_HEADER => {}
        Some(header) => return Err(malformed(format!("unexpected header '{header}'"))),
        None => return Err(malformed("missing header".to_string())),
    }
    let mut rows = Vec::new();
    for (idx, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 2;
        let (file_name, label) = line
            .rsplit_once(FIELD_DELIMITER)
            .ok_or_else(|| malformed(format!("line {line_no} has no label column")))?;
        let label = match label.trim() {
            "0" => 0,
            "1" => 1,
            other => return Err(malformed(format!("line {line_no} has label '{other}'"))),
        };
        rows.push(ManifestRow::new(file_name.trim(), label));
    }
    Ok(rows)
}

/// Row counts of one manifest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManifestSummary {
    /// Rows including repeats.
    pub rows: usize,
    /// Distinct file names.
    pub distinct_files: usize,
    /// Rows labelled `1`.
    pub positives: usize,
    /// Rows labelled `0`.
    pub negatives: usize,
}

impl ManifestSummary {
    /// Summarize `rows`.
    pub fn of(rows: &[ManifestRow]) -> Self {
        let distinct: HashSet<&str> = rows.iter().map(|row| row.file_name.as_str()).collect();
        let positives = rows.iter().filter(|row| row.label == 1).count();
        Self {
            rows: rows.len(),
            distinct_files: distinct.len(),
            positives,
            negatives: rows.len() - positives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn set_names_follow_loader_flags() {
        assert_eq!(SetName::for_mode(true, true), SetName::Tain);
        assert_eq!(SetName::for_mode(true, false), SetName::Full);
        assert_eq!(SetName::for_mode(false, true), SetName::Eval);
        assert_eq!(SetName::for_mode(false, false), SetName::Test);
        assert!(SetName::Test.is_held_out());
        assert!(SetName::Full.is_training());
        assert!(!SetName::Eval.is_training());
        assert!(SetName::Eval.is_validation_split());
    }

    #[test]
    fn manifest_file_name_encodes_set_subject_electrode() {
        assert_eq!(manifest_file_name(SetName::Tain, 1, 3), "tain-1-3-index.csv");
        assert_eq!(manifest_file_name(SetName::Test, 2, 15), "test-2-15-index.csv");
    }

    #[test]
    fn written_manifest_has_header_and_repeated_rows() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("tain-1-0-index.csv");
        let rows = vec![
            ManifestRow::new("1_1_0.0.wav", 0),
            ManifestRow::new("1_7_1.0.wav", 1),
            ManifestRow::new("1_7_1.0.wav", 1),
        ];
        write_manifest(&path, &rows).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "filename,label\n1_1_0.0.wav,0\n1_7_1.0.wav,1\n1_7_1.0.wav,1\n"
        );
        assert_eq!(read_manifest(&path).unwrap(), rows);

        let leftovers: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "staging file must be renamed away");
    }

    #[test]
    fn empty_manifest_keeps_header() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("eval-1-0-index.csv");
        write_manifest(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "filename,label\n");
        assert!(read_manifest(&path).unwrap().is_empty());
    }

    #[test]
    fn read_rejects_bad_header_and_labels() {
        let temp = tempdir().unwrap();
        let bad_header = temp.path().join("a.csv");
        fs::write(&bad_header, "file,class\nx.wav,0\n").unwrap();
        assert!(matches!(
            read_manifest(&bad_header),
            Err(IndexError::Manifest { ref details, .. }) if details.contains("unexpected header")
        ));

        let bad_label = temp.path().join("b.csv");
        fs::write(&bad_label, "filename,label\nx.wav,2\n").unwrap();
        assert!(matches!(
            read_manifest(&bad_label),
            Err(IndexError::Manifest { ref details, .. }) if details.contains("line 2")
        ));
    }

    #[test]
    fn summary_counts_repeats_and_labels() {
        let rows = vec![
            ManifestRow::new("a.wav", 0),
            ManifestRow::new("b.wav", 1),
            ManifestRow::new("b.wav", 1),
        ];
        let summary = ManifestSummary::of(&rows);
        assert_eq!(
            summary,
            ManifestSummary {
                rows: 3,
                distinct_files: 2,
                positives: 2,
                negatives: 1,
            }
        );
    }
}
