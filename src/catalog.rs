//! Per-electrode waveform file catalogs.
//!
//! Waveform files follow `<prefix>_<segment>_<label>.<electrode>.<ext>`; held-out
//! files drop the label token. Names are parsed exactly once into a
//! [`RecordingKey`] when the catalog is built.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::catalog::{
    PART_DELIMITER, SEGMENTS_PER_HOUR, SKIP_UNPARSEABLE_MSG, TOKEN_DELIMITER, WAVEFORM_EXTENSION,
};
use crate::constants::manifest::PLACEHOLDER_LABEL;
use crate::errors::IndexError;
use crate::safety::SafetyRegistry;
use crate::transport::fs::DirScanner;
use crate::types::{Electrode, FileName, HourBucket, SegmentNumber, SubjectId};

/// Binary class label carried by training recordings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    /// Class `0`.
    Negative,
    /// Class `1`.
    Positive,
}

impl Label {
    /// Parse the literal `0` or `1`.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "0" => Some(Label::Negative),
            "1" => Some(Label::Positive),
            _ => None,
        }
    }

    /// Digit written into manifests.
    pub fn as_digit(self) -> u8 {
        match self {
            Label::Negative => 0,
            Label::Positive => 1,
        }
    }
}

/// Hour bucket of `segment`: the first segment of its run of six.
///
/// `segment` must be positive.
pub fn hour_bucket(segment: SegmentNumber) -> HourBucket {
    segment - (segment - 1) % SEGMENTS_PER_HOUR
}

/// Recording id of a file name: everything before the first `.`.
pub fn recording_id(file_name: &str) -> &str {
    file_name.split(PART_DELIMITER).next().unwrap_or(file_name)
}

fn stem_tokens(file_name: &str) -> Vec<&str> {
    recording_id(file_name).split(TOKEN_DELIMITER).collect()
}

fn invalid(file_name: &str, reason: impl Into<String>) -> IndexError {
    IndexError::InvalidFileName {
        name: file_name.to_string(),
        reason: reason.into(),
    }
}

/// Segment number: the second underscore token of the stem.
pub fn segment_number(file_name: &str) -> Result<SegmentNumber, IndexError> {
    let tokens = stem_tokens(file_name);
    let token = tokens
        .get(1)
        .ok_or_else(|| invalid(file_name, "missing segment token"))?;
    let segment = token
        .parse::<SegmentNumber>()
        .map_err(|_| invalid(file_name, format!("segment token '{token}' is not an integer")))?;
    if segment == 0 {
        return Err(invalid(file_name, "segment numbers start at 1"));
    }
    Ok(segment)
}

/// Class label: the last underscore token of the stem.
pub fn label(file_name: &str) -> Result<Label, IndexError> {
    let tokens = stem_tokens(file_name);
    let token = tokens.last().copied().unwrap_or_default();
    Label::parse(token)
        .ok_or_else(|| invalid(file_name, format!("label token '{token}' is not 0 or 1")))
}

/// Parsed identity of one waveform file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordingKey {
    /// Subject the catalog was built for.
    pub subject: SubjectId,
    /// Segment number parsed from the name.
    pub segment: SegmentNumber,
    /// Electrode the catalog was built for.
    pub electrode: Electrode,
    /// Class label; `None` for held-out files.
    pub label: Option<Label>,
}

impl RecordingKey {
    /// Hour bucket of this segment.
    pub fn hour(&self) -> HourBucket {
        hour_bucket(self.segment)
    }

    /// Label digit written into manifests (placeholder `0` when unknown).
    pub fn manifest_label(&self) -> u8 {
        self.label
            .map(Label::as_digit)
            .unwrap_or(PLACEHOLDER_LABEL)
    }

    /// Waveform file name produced by signal extraction for this key.
    pub fn waveform_file_name(&self, prefix: &str) -> FileName {
        let stem = match self.label {
            Some(label) => format!(
                "{prefix}{TOKEN_DELIMITER}{}{TOKEN_DELIMITER}{}",
                self.segment,
                label.as_digit()
            ),
            None => format!("{prefix}{TOKEN_DELIMITER}{}", self.segment),
        };
        format!(
            "{stem}{PART_DELIMITER}{}{PART_DELIMITER}{WAVEFORM_EXTENSION}",
            self.electrode
        )
    }
}

/// Glob-like pattern `*.<electrode>.<extension>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectrodePattern {
    electrode: Electrode,
    extension: String,
}

impl ElectrodePattern {
    /// Pattern for extracted `.wav` files of `electrode`.
    pub fn waveform(electrode: Electrode) -> Self {
        Self::new(electrode, WAVEFORM_EXTENSION)
    }

    /// Pattern with a custom extension.
    pub fn new(electrode: Electrode, extension: impl Into<String>) -> Self {
        Self {
            electrode,
            extension: extension.into(),
        }
    }

    /// Electrode matched by this pattern.
    pub fn electrode(&self) -> Electrode {
        self.electrode
    }

    /// True if `file_name` ends with `.<electrode>.<extension>`.
    pub fn matches(&self, file_name: &str) -> bool {
        let suffix = format!(
            "{PART_DELIMITER}{}{PART_DELIMITER}{}",
            self.electrode, self.extension
        );
        file_name.len() > suffix.len() && file_name.ends_with(&suffix)
    }
}

impl fmt::Display for ElectrodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "*{PART_DELIMITER}{}{PART_DELIMITER}{}",
            self.electrode, self.extension
        )
    }
}

/// One cataloged file and its parsed key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Basename inside the catalog directory.
    pub file_name: FileName,
    /// Parsed identity.
    pub key: RecordingKey,
}

/// Files of one electrode in one directory, ordered by segment number.
#[derive(Clone, Debug)]
pub struct FileCatalog {
    dir: PathBuf,
    pattern: ElectrodePattern,
    entries: Vec<CatalogEntry>,
}

impl FileCatalog {
    /// Scan `dir` for files matching `pattern`.
    ///
    /// `labelled` catalogs require a `0`/`1` label token; unlabelled (held-out)
    /// catalogs ignore it. Unparseable names are skipped with a warning. Zero
    /// usable files is a precondition failure.
    pub fn scan(
        dir: impl Into<PathBuf>,
        subject: SubjectId,
        pattern: ElectrodePattern,
        labelled: bool,
    ) -> Result<Self, IndexError> {
        Self::scan_with(&DirScanner::new(dir), subject, pattern, labelled)
    }

    /// Like [`FileCatalog::scan`] with a preconfigured scanner.
    pub fn scan_with(
        scanner: &DirScanner,
        subject: SubjectId,
        pattern: ElectrodePattern,
        labelled: bool,
    ) -> Result<Self, IndexError> {
        let names = scanner.file_names(|name| pattern.matches(name))?;
        let catalog =
            Self::from_file_names(scanner.root().to_path_buf(), subject, pattern, labelled, names)?;
        debug!(
            dir = %catalog.dir.display(),
            pattern = %catalog.pattern,
            count = catalog.entries.len(),
            "cataloged waveform files"
        );
        Ok(catalog)
    }

    /// Build a catalog from already-listed basenames.
    pub fn from_file_names<I>(
        dir: impl Into<PathBuf>,
        subject: SubjectId,
        pattern: ElectrodePattern,
        labelled: bool,
        names: I,
    ) -> Result<Self, IndexError>
    where
        I: IntoIterator,
        I::Item: Into<FileName>,
    {
        let dir = dir.into();
        let mut entries = Vec::new();
        for name in names {
            let file_name = name.into();
            match parse_entry(&file_name, subject, pattern.electrode(), labelled) {
                Ok(entry) => entries.push(entry),
                Err(err) if err.is_skippable() => {
                    warn!(
                        dir = %dir.display(),
                        file = %file_name,
                        error = %err,
                        "{}", SKIP_UNPARSEABLE_MSG
                    );
                }
                Err(err) => return Err(err),
            }
        }
        if entries.is_empty() {
            return Err(IndexError::NoMatchingFiles {
                dir,
                pattern: pattern.to_string(),
            });
        }
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        entries.sort_by_key(|entry| entry.key.segment);
        Ok(Self {
            dir,
            pattern,
            entries,
        })
    }

    /// Directory the catalog was built from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pattern the catalog was built with.
    pub fn pattern(&self) -> &ElectrodePattern {
        &self.pattern
    }

    /// Entries in ascending segment order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of cataloged files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no files remain (possible only after filtering).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct hour buckets, ascending.
    pub fn hours(&self) -> Vec<HourBucket> {
        self.entries
            .iter()
            .map(|entry| entry.key.hour())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Keep only entries accepted by `keep`; returns the number removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&CatalogEntry) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|entry| keep(entry));
        before - self.entries.len()
    }

    /// Drop entries the registry does not mark safe; returns the number removed.
    pub fn retain_safe(&mut self, registry: &SafetyRegistry) -> usize {
        let removed = self.retain(|entry| registry.is_safe(&entry.file_name));
        if removed > 0 {
            debug!(
                dir = %self.dir.display(),
                pattern = %self.pattern,
                removed,
                remaining = self.entries.len(),
                "dropped unsafe recordings"
            );
        }
        removed
    }

    /// Split entries into (positive, negative) groups, preserving order.
    ///
    /// Unlabelled entries count as negative.
    pub fn partition_by_label(&self) -> (Vec<&CatalogEntry>, Vec<&CatalogEntry>) {
        self.entries
            .iter()
            .partition(|entry| entry.key.label == Some(Label::Positive))
    }
}

fn parse_entry(
    file_name: &str,
    subject: SubjectId,
    electrode: Electrode,
    labelled: bool,
) -> Result<CatalogEntry, IndexError> {
    let segment = segment_number(file_name)?;
    let label = if labelled {
        Some(label(file_name)?)
    } else {
        None
    };
    Ok(CatalogEntry {
        file_name: file_name.to_string(),
        key: RecordingKey {
            subject,
            segment,
            electrode,
            label,
        },
    })
}
