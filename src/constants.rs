/// Constants used by waveform file cataloging.
pub mod catalog {
    /// Number of consecutive segments forming one hour bucket.
    pub const SEGMENTS_PER_HOUR: u32 = 6;
    /// Extension of extracted per-electrode waveform files.
    pub const WAVEFORM_EXTENSION: &str = "wav";
    /// Delimiter between stem and electrode/extension parts.
    pub const PART_DELIMITER: char = '.';
    /// Delimiter between tokens of the stem.
    pub const TOKEN_DELIMITER: char = '_';
    /// Log message used when unparseable file names are skipped.
    pub const SKIP_UNPARSEABLE_MSG: &str = "skipping unparseable waveform file";
}

/// Constants used by the safety metadata registry.
pub mod safety {
    /// Default file name of the safety metadata table (sibling of the subject directories).
    pub const DEFAULT_SAFETY_FILENAME: &str = "train_and_test_data_labels_safe.csv";
    /// Literal value marking a recording as safe.
    pub const SAFE_FLAG: &str = "1";
    /// Log message used when malformed registry rows are skipped.
    pub const SKIP_MALFORMED_ROW_MSG: &str = "skipping malformed safety metadata row";
}

/// Constants used by manifest encoding and layout.
pub mod manifest {
    /// Mandatory manifest header row.
    pub const MANIFEST_HEADER: &str = "filename,label";
    /// Column delimiter used in manifests and metadata tables.
    pub const FIELD_DELIMITER: char = ',';
    /// Suffix appended to `<set>-<subject>-<electrode>` to form a manifest file name.
    pub const MANIFEST_SUFFIX: &str = "-index.csv";
    /// Label written for held-out files whose class is unknown.
    pub const PLACEHOLDER_LABEL: u8 = 0;
}

/// Constants used by split policies and indexer defaults.
pub mod splits {
    /// Seed used for the hour shuffle when none is configured.
    pub const DEFAULT_SEED: u64 = 0;
    /// Share of hour buckets (or hours) assigned to training in validation mode.
    pub const DEFAULT_TRAIN_PERCENT: u32 = 70;
    /// Electrodes per recording.
    pub const DEFAULT_ELECTRODE_COUNT: u32 = 16;
    /// Scale applied by the oversampling policy when no subject override exists.
    pub const DEFAULT_REPEAT_SCALE: f64 = 1.0;
    /// Largest accepted repeat scale; the most recent hour repeats at most this many extra times.
    pub const MAX_REPEAT_SCALE: f64 = 64.0;
}
