//! Hour-aligned train/validation split policies.
//!
//! Ownership model:
//! - `HourShuffler` owns the deterministic permutation of hour buckets. It is
//!   injected per call; there is no process-wide generator.
//! - `SplitPolicy` turns a filtered `FileCatalog` into manifest rows for both
//!   subsets without touching the filesystem.

use std::collections::HashMap;

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogEntry, FileCatalog, Label};
use crate::constants::splits::{DEFAULT_REPEAT_SCALE, MAX_REPEAT_SCALE};
use crate::errors::IndexError;
use crate::manifest::ManifestRow;
use crate::types::{HourBucket, SubjectId};

/// Subset a file is assigned to by a split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Subset {
    /// Training subset.
    Train,
    /// Held-back validation subset.
    Validation,
}

/// Whether a split holds back validation data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitMode {
    /// Hold back data; `train_percent` of hours (or of each class's hour range) train.
    Validate {
        /// Share assigned to training, `0..=100`.
        train_percent: u32,
    },
    /// Everything trains.
    Full,
}

impl SplitMode {
    /// Validation mode with a checked percentage.
    pub fn validate(train_percent: u32) -> Result<Self, IndexError> {
        if train_percent > 100 {
            return Err(IndexError::Configuration(format!(
                "train percent must be within 0..=100, got {train_percent}"
            )));
        }
        Ok(SplitMode::Validate { train_percent })
    }

    /// True when validation data is held back.
    pub fn is_validate(self) -> bool {
        matches!(self, SplitMode::Validate { .. })
    }
}

/// Rows produced by a split, in catalog order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitOutcome {
    /// Training rows, repeated for oversampling.
    pub train: Vec<ManifestRow>,
    /// Validation rows, each file once.
    pub validation: Vec<ManifestRow>,
}

impl SplitOutcome {
    /// Rows of one subset.
    pub fn rows(&self, subset: Subset) -> &[ManifestRow] {
        match subset {
            Subset::Train => &self.train,
            Subset::Validation => &self.validation,
        }
    }

    /// Take the rows of one subset.
    pub fn into_rows(self, subset: Subset) -> Vec<ManifestRow> {
        match subset {
            Subset::Train => self.train,
            Subset::Validation => self.validation,
        }
    }
}

/// Deterministic permutation applied to the ascending list of hour buckets.
pub trait HourShuffler {
    /// Reorder `hours` in place.
    fn shuffle(&mut self, hours: &mut [HourBucket]);
}

/// Small deterministic RNG (splitmix64) used for reproducible shuffles.
///
/// Its output depends only on the seed, so the same seed yields the same
/// permutation on every platform.
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Generator starting from `seed`.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl rand::RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            let bytes = self.next_u64_internal().to_le_bytes();
            let copy_len = (dest.len() - offset).min(bytes.len());
            dest[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            offset += copy_len;
        }
    }
}

/// Fisher–Yates shuffle driven by a seeded [`DeterministicRng`].
#[derive(Clone, Debug)]
pub struct SeededShuffle {
    rng: DeterministicRng,
}

impl SeededShuffle {
    /// Shuffler seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed),
        }
    }
}

impl HourShuffler for SeededShuffle {
    fn shuffle(&mut self, hours: &mut [HourBucket]) {
        hours.shuffle(&mut self.rng);
    }
}

/// Leaves hours in ascending order.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedOrder;

impl HourShuffler for FixedOrder {
    fn shuffle(&mut self, _hours: &mut [HourBucket]) {}
}

/// Orders hours by their position in a scripted sequence; unlisted hours keep
/// ascending order after the listed ones.
#[derive(Clone, Debug, Default)]
pub struct ScriptedOrder {
    order: Vec<HourBucket>,
}

impl ScriptedOrder {
    /// Shuffler that reproduces `order`.
    pub fn new(order: impl Into<Vec<HourBucket>>) -> Self {
        Self {
            order: order.into(),
        }
    }
}

impl HourShuffler for ScriptedOrder {
    fn shuffle(&mut self, hours: &mut [HourBucket]) {
        let rank: HashMap<HourBucket, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(idx, hour)| (*hour, idx))
            .collect();
        hours.sort_by_key(|hour| (rank.get(hour).copied().unwrap_or(usize::MAX), *hour));
    }
}

/// Split algorithm selected by configuration.
pub trait SplitPolicy: Send + Sync {
    /// Short policy name used in logs.
    fn name(&self) -> &'static str;
    /// Assign every catalog entry to a subset and emit manifest rows.
    fn split(
        &self,
        catalog: &FileCatalog,
        mode: SplitMode,
        shuffler: &mut dyn HourShuffler,
    ) -> Result<SplitOutcome, IndexError>;
}

/// Shuffle distinct hours and give the leading share to training.
///
/// Returned map preserves the shuffled order.
pub fn assign_hours(
    hours: &[HourBucket],
    mode: SplitMode,
    shuffler: &mut dyn HourShuffler,
) -> IndexMap<HourBucket, Subset> {
    let mut order = hours.to_vec();
    order.sort_unstable();
    order.dedup();
    shuffler.shuffle(&mut order);
    let train_count = match mode {
        SplitMode::Validate { train_percent } => order.len() * train_percent as usize / 100,
        SplitMode::Full => order.len(),
    };
    order
        .into_iter()
        .enumerate()
        .map(|(idx, hour)| {
            let subset = if idx < train_count {
                Subset::Train
            } else {
                Subset::Validation
            };
            (hour, subset)
        })
        .collect()
}

/// Whole hour buckets go to one subset, no repetition.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformHourSplit;

impl SplitPolicy for UniformHourSplit {
    fn name(&self) -> &'static str {
        "uniform_hour"
    }

    fn split(
        &self,
        catalog: &FileCatalog,
        mode: SplitMode,
        shuffler: &mut dyn HourShuffler,
    ) -> Result<SplitOutcome, IndexError> {
        let assignment = assign_hours(&catalog.hours(), mode, shuffler);
        let mut outcome = SplitOutcome::default();
        for entry in catalog.entries() {
            let hour = entry.key.hour();
            let subset = assignment.get(&hour).copied().ok_or_else(|| {
                IndexError::InvariantViolation(format!(
                    "hour {hour} of '{}' was not assigned",
                    entry.file_name
                ))
            })?;
            match subset {
                Subset::Train => outcome.train.push(ManifestRow::from_entry(entry)),
                Subset::Validation => outcome.validation.push(ManifestRow::from_entry(entry)),
            }
        }
        Ok(outcome)
    }
}

/// Scale factor for recency-weighted repeat counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatScale {
    /// Same scale for every subject.
    Uniform(f64),
    /// Per-subject scale with a fallback.
    PerSubject {
        /// Subject → scale overrides.
        factors: IndexMap<SubjectId, f64>,
        /// Scale for subjects without an override.
        default: f64,
    },
}

impl Default for RepeatScale {
    fn default() -> Self {
        RepeatScale::Uniform(DEFAULT_REPEAT_SCALE)
    }
}

impl RepeatScale {
    /// Scale that caps the most recent hour at `max_rep_count` copies.
    pub fn max_repeat(max_rep_count: u32) -> Self {
        RepeatScale::Uniform(f64::from(max_rep_count.saturating_sub(1)))
    }

    /// Scale applied to `subject`.
    pub fn scale_for(&self, subject: SubjectId) -> f64 {
        match self {
            RepeatScale::Uniform(scale) => *scale,
            RepeatScale::PerSubject { factors, default } => {
                factors.get(&subject).copied().unwrap_or(*default)
            }
        }
    }

    /// Reject scales outside `0.0..=MAX_REPEAT_SCALE`.
    pub fn validated(self) -> Result<Self, IndexError> {
        let check = |scale: f64| {
            if (0.0..=MAX_REPEAT_SCALE).contains(&scale) {
                Ok(())
            } else {
                Err(IndexError::Configuration(format!(
                    "repeat scale must be within 0..={MAX_REPEAT_SCALE}, got {scale}"
                )))
            }
        };
        match &self {
            RepeatScale::Uniform(scale) => check(*scale)?,
            RepeatScale::PerSubject { factors, default } => {
                check(*default)?;
                for scale in factors.values() {
                    check(*scale)?;
                }
            }
        }
        Ok(self)
    }
}

/// Copies of a training file in hour `hour` given the class `cutoff`.
///
/// `floor(scale * hour / cutoff) + 1`, capped at `MAX_REPEAT_SCALE + 1`.
/// A zero cutoff or a negative/NaN scale yields `1`.
pub fn repeat_count(scale: f64, hour: HourBucket, cutoff: HourBucket) -> usize {
    if cutoff == 0 {
        return 1;
    }
    let extra = (scale * f64::from(hour) / f64::from(cutoff)).floor();
    if !(extra >= 1.0) {
        return 1;
    }
    (extra.min(MAX_REPEAT_SCALE) as usize).saturating_add(1)
}

/// Last training hour for a class whose latest hour is `max_hour`.
pub fn class_cutoff(max_hour: HourBucket, mode: SplitMode) -> HourBucket {
    match mode {
        SplitMode::Validate { train_percent } => {
            (u64::from(max_hour) * u64::from(train_percent) / 100) as HourBucket
        }
        SplitMode::Full => max_hour,
    }
}

/// Per-class hour cutoffs with recency-weighted oversampling.
#[derive(Clone, Debug, Default)]
pub struct ClassBalancedOversample {
    scale: RepeatScale,
}

impl ClassBalancedOversample {
    /// Policy using `scale` for repeat counts.
    pub fn new(scale: RepeatScale) -> Self {
        Self { scale }
    }

    fn cutoffs(catalog: &FileCatalog, mode: SplitMode) -> HashMap<Option<Label>, HourBucket> {
        let (positive, negative) = catalog.partition_by_label();
        let mut cutoffs = HashMap::new();
        for (class, group) in [(Some(Label::Positive), positive), (None, negative)] {
            if let Some(max_hour) = group.iter().map(|entry| entry.key.hour()).max() {
                cutoffs.insert(class, class_cutoff(max_hour, mode));
            }
        }
        cutoffs
    }
}

fn class_of(entry: &CatalogEntry) -> Option<Label> {
    match entry.key.label {
        Some(Label::Positive) => Some(Label::Positive),
        _ => None,
    }
}

impl SplitPolicy for ClassBalancedOversample {
    fn name(&self) -> &'static str {
        "class_balanced_oversample"
    }

    fn split(
        &self,
        catalog: &FileCatalog,
        mode: SplitMode,
        _shuffler: &mut dyn HourShuffler,
    ) -> Result<SplitOutcome, IndexError> {
        let cutoffs = Self::cutoffs(catalog, mode);
        let mut outcome = SplitOutcome::default();
        for entry in catalog.entries() {
            let hour = entry.key.hour();
            let cutoff = cutoffs.get(&class_of(entry)).copied().unwrap_or(0);
            if hour <= cutoff {
                let scale = self.scale.scale_for(entry.key.subject);
                let row = ManifestRow::from_entry(entry);
                for _ in 1..repeat_count(scale, hour, cutoff) {
                    outcome.train.push(row.clone());
                }
                outcome.train.push(row);
            } else {
                if !mode.is_validate() {
                    return Err(IndexError::InvariantViolation(format!(
                        "'{}' (hour {hour}) is past the training cutoff {cutoff} outside validation mode",
                        entry.file_name
                    )));
                }
                outcome.validation.push(ManifestRow::from_entry(entry));
            }
        }
        Ok(outcome)
    }
}
