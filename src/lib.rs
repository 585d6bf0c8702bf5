#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Waveform file catalogs and file-name accessors.
pub mod catalog;
/// `build_index` command-line runner.
pub mod cli;
/// Indexer configuration types.
pub mod config;
/// Centralized constants used across catalogs, splits, and manifests.
pub mod constants;
/// Manifest orchestration.
pub mod indexer;
/// Manifest layout, encoding, and summaries.
pub mod manifest;
/// Safety metadata registry.
pub mod safety;
/// Hour-aligned split policies and deterministic shuffles.
pub mod splits;
/// Input transports (filesystem today).
pub mod transport;
/// Shared type aliases.
pub mod types;

mod errors;

pub use catalog::{CatalogEntry, ElectrodePattern, FileCatalog, Label, RecordingKey};
pub use config::{DataRoots, IndexerConfig, PolicyConfig};
pub use errors::IndexError;
pub use indexer::Indexer;
pub use manifest::{ManifestRow, ManifestSummary, SetName};
pub use safety::{SafetyEntry, SafetyRegistry};
pub use splits::{
    ClassBalancedOversample, DeterministicRng, FixedOrder, HourShuffler, RepeatScale,
    ScriptedOrder, SeededShuffle, SplitMode, SplitOutcome, SplitPolicy, Subset, UniformHourSplit,
};
pub use types::{Electrode, FileName, HourBucket, RecordingId, SegmentNumber, SubjectId};
