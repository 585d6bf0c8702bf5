use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::catalog::WAVEFORM_EXTENSION;
use crate::constants::safety::DEFAULT_SAFETY_FILENAME;
use crate::constants::splits::{DEFAULT_SEED, DEFAULT_TRAIN_PERCENT};
use crate::errors::IndexError;
use crate::manifest::SetName;
use crate::splits::{
    ClassBalancedOversample, RepeatScale, SplitMode, SplitPolicy, UniformHourSplit,
};
use crate::types::SubjectId;

/// Source directories for one subject.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRoots {
    /// Labelled recordings (`train_<subject>`).
    pub train_root: PathBuf,
    /// Held-out recordings (`test_<subject>`).
    pub test_root: PathBuf,
    /// Previously held-out recordings whose labels were released later.
    #[serde(default)]
    pub old_test_root: Option<PathBuf>,
}

impl DataRoots {
    /// Roots with explicit train and test directories.
    pub fn new(train_root: impl Into<PathBuf>, test_root: impl Into<PathBuf>) -> Self {
        Self {
            train_root: train_root.into(),
            test_root: test_root.into(),
            old_test_root: None,
        }
    }

    /// Derive the test root by replacing `train` with `test` in the train root.
    pub fn from_train_root(train_root: impl Into<PathBuf>) -> Self {
        let train_root = train_root.into();
        let test_root = PathBuf::from(train_root.to_string_lossy().replace("train", "test"));
        Self {
            train_root,
            test_root,
            old_test_root: None,
        }
    }

    /// Attach an old-test directory used for augmentation.
    pub fn with_old_test_root(mut self, old_test_root: impl Into<PathBuf>) -> Self {
        self.old_test_root = Some(old_test_root.into());
        self
    }
}

/// Split policy selection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Hour buckets shuffled and cut by percentage.
    #[default]
    UniformHour,
    /// Per-class cutoffs with recency-weighted oversampling.
    ClassBalancedOversample {
        /// Scale for repeat counts.
        #[serde(default)]
        repeat_scale: RepeatScale,
    },
}

impl PolicyConfig {
    /// Instantiate the configured policy.
    pub fn build(&self) -> Result<Box<dyn SplitPolicy>, IndexError> {
        Ok(match self {
            PolicyConfig::UniformHour => Box::new(UniformHourSplit),
            PolicyConfig::ClassBalancedOversample { repeat_scale } => Box::new(
                ClassBalancedOversample::new(repeat_scale.clone().validated()?),
            ),
        })
    }
}

/// Settings fixed for the lifetime of an [`crate::Indexer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Source directories.
    pub roots: DataRoots,
    /// Subject whose recordings are indexed.
    pub subject: SubjectId,
    /// Hold back validation data.
    pub validate_mode: bool,
    /// Build the training side (`tain`/`full`) rather than `eval`/`test`.
    pub training: bool,
    /// Share assigned to training in validation mode.
    pub train_percent: u32,
    /// Seed for the hour shuffle.
    pub seed: u64,
    /// Split policy.
    pub policy: PolicyConfig,
    /// Safety table name, resolved in the parent of the train root.
    pub safety_file_name: String,
    /// Waveform file extension.
    pub extension: String,
    /// Follow symlinks when listing directories.
    pub follow_links: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            roots: DataRoots::default(),
            subject: 1,
            validate_mode: true,
            training: true,
            train_percent: DEFAULT_TRAIN_PERCENT,
            seed: DEFAULT_SEED,
            policy: PolicyConfig::default(),
            safety_file_name: DEFAULT_SAFETY_FILENAME.to_string(),
            extension: WAVEFORM_EXTENSION.to_string(),
            follow_links: true,
        }
    }
}

impl IndexerConfig {
    /// Config for `subject` reading from `roots`.
    pub fn new(roots: DataRoots, subject: SubjectId) -> Self {
        Self {
            roots,
            subject,
            ..Self::default()
        }
    }

    /// Load a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, IndexError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set the validation-mode flag.
    pub fn with_validate_mode(mut self, validate_mode: bool) -> Self {
        self.validate_mode = validate_mode;
        self
    }

    /// Set the training flag.
    pub fn with_training(mut self, training: bool) -> Self {
        self.training = training;
        self
    }

    /// Set the training share.
    pub fn with_train_percent(mut self, train_percent: u32) -> Self {
        self.train_percent = train_percent;
        self
    }

    /// Set the shuffle seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the split policy.
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Override the safety table file name.
    pub fn with_safety_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.safety_file_name = file_name.into();
        self
    }

    /// Override the waveform extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Enable or disable following symlinks.
    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    /// Split mode implied by the flags.
    pub fn split_mode(&self) -> Result<SplitMode, IndexError> {
        if self.validate_mode {
            SplitMode::validate(self.train_percent)
        } else {
            Ok(SplitMode::Full)
        }
    }

    /// Set implied by the `training`/`validate_mode` flags.
    pub fn set_name(&self) -> SetName {
        SetName::for_mode(self.training, self.validate_mode)
    }

    /// True when the safety registry is needed (anything but pure held-out inference).
    pub fn needs_safety_metadata(&self) -> bool {
        self.training || self.validate_mode
    }

    /// Check values that cannot be validated by the type system.
    pub fn validate(&self) -> Result<(), IndexError> {
        self.split_mode()?;
        if self.extension.is_empty() {
            return Err(IndexError::Configuration(
                "waveform extension must not be empty".to_string(),
            ));
        }
        if self.safety_file_name.is_empty() {
            return Err(IndexError::Configuration(
                "safety metadata file name must not be empty".to_string(),
            ));
        }
        if let PolicyConfig::ClassBalancedOversample { repeat_scale } = &self.policy {
            repeat_scale.clone().validated()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn from_train_root_swaps_train_for_test() {
        let roots = DataRoots::from_train_root("/data/train_1");
        assert_eq!(roots.test_root, PathBuf::from("/data/test_1"));
        assert!(roots.old_test_root.is_none());
        let roots = roots.with_old_test_root("/data/test_1_old");
        assert_eq!(roots.old_test_root, Some(PathBuf::from("/data/test_1_old")));
    }

    #[test]
    fn split_mode_follows_validate_flag() {
        let config = IndexerConfig::default();
        assert_eq!(
            config.split_mode().unwrap(),
            SplitMode::Validate { train_percent: 70 }
        );
        let config = config.with_validate_mode(false).with_train_percent(500);
        assert_eq!(config.split_mode().unwrap(), SplitMode::Full);

        let invalid = IndexerConfig::default().with_train_percent(101);
        assert!(matches!(invalid.validate(), Err(IndexError::Configuration(_))));
    }

    #[test]
    fn safety_metadata_skipped_only_for_held_out_inference() {
        let config = IndexerConfig::default();
        assert!(config.needs_safety_metadata());
        let inference = config.with_training(false).with_validate_mode(false);
        assert!(!inference.needs_safety_metadata());
    }

    #[test]
    fn json_config_fills_missing_fields_with_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("indexer.json");
        fs::write(
            &path,
            r#"{
                "roots": { "train_root": "/d/train_2", "test_root": "/d/test_2" },
                "subject": 2,
                "policy": {
                    "kind": "class_balanced_oversample",
                    "repeat_scale": { "uniform": 3.0 }
                }
            }"#,
        )
        .unwrap();
        let config = IndexerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.subject, 2);
        assert_eq!(config.train_percent, DEFAULT_TRAIN_PERCENT);
        assert_eq!(config.safety_file_name, DEFAULT_SAFETY_FILENAME);
        assert_eq!(
            config.policy,
            PolicyConfig::ClassBalancedOversample {
                repeat_scale: RepeatScale::Uniform(3.0)
            }
        );
        assert_eq!(config.policy.build().unwrap().name(), "class_balanced_oversample");
    }

    #[test]
    fn negative_repeat_scale_is_rejected() {
        let config = IndexerConfig::default().with_policy(PolicyConfig::ClassBalancedOversample {
            repeat_scale: RepeatScale::Uniform(-2.0),
        });
        assert!(config.validate().is_err());
        assert!(config.policy.build().is_err());
    }
}
