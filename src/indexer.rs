//! Manifest orchestration.
//!
//! An [`Indexer`] owns one subject's configuration, the split policy, and the
//! safety registry. Each `(electrode, set)` build is independent and memoized
//! by the existence of its manifest file.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::catalog::{ElectrodePattern, FileCatalog, Label};
use crate::config::IndexerConfig;
use crate::errors::IndexError;
use crate::manifest::{ManifestRow, SetName, manifest_file_name, write_manifest};
use crate::safety::SafetyRegistry;
use crate::splits::{HourShuffler, SeededShuffle, SplitMode, SplitPolicy, Subset};
use crate::transport::fs::{DirScanner, relative_path};
use crate::types::Electrode;

/// Builds and memoizes index manifests for one subject.
pub struct Indexer {
    config: IndexerConfig,
    policy: Box<dyn SplitPolicy>,
    registry: Option<SafetyRegistry>,
}

impl Indexer {
    /// Validate `config`, check its source directories, and load safety metadata.
    ///
    /// The registry is loaded only when training or validating; held-out
    /// inference never reads it.
    pub fn new(config: IndexerConfig) -> Result<Self, IndexError> {
        config.validate()?;
        let set = config.set_name();
        require_dir(source_dir(&config, set))?;
        if set.is_training()
            && let Some(old_test_root) = &config.roots.old_test_root
        {
            require_dir(old_test_root)?;
        }
        let registry = if config.needs_safety_metadata() {
            let path = SafetyRegistry::path_for(&config.roots.train_root, &config.safety_file_name);
            Some(SafetyRegistry::load(&path)?)
        } else {
            None
        };
        let policy = config.policy.build()?;
        debug!(
            subject = config.subject,
            set = %set,
            policy = policy.name(),
            "indexer ready"
        );
        Ok(Self {
            config,
            policy,
            registry,
        })
    }

    /// Configuration fixed at construction.
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Loaded safety registry, if any.
    pub fn registry(&self) -> Option<&SafetyRegistry> {
        self.registry.as_ref()
    }

    /// Set implied by the configured `training`/`validate_mode` flags.
    pub fn set_name(&self) -> SetName {
        self.config.set_name()
    }

    /// Where the manifest for `(electrode, set)` lives.
    pub fn manifest_path(&self, electrode: Electrode, set: SetName) -> PathBuf {
        source_dir(&self.config, set).join(manifest_file_name(set, self.config.subject, electrode))
    }

    /// Manifest of the configured set for `electrode`.
    pub fn index_for(&self, electrode: Electrode) -> Result<PathBuf, IndexError> {
        self.build_index(electrode, self.set_name())
    }

    /// Return the manifest path for `(electrode, set)`, building it first if absent.
    pub fn build_index(&self, electrode: Electrode, set: SetName) -> Result<PathBuf, IndexError> {
        let path = self.manifest_path(electrode, set);
        if path.is_file() {
            debug!(path = %path.display(), "reusing existing manifest");
            return Ok(path);
        }
        let mut shuffler = SeededShuffle::new(self.config.seed);
        let rows = self.manifest_rows_with(electrode, set, &mut shuffler)?;
        write_manifest(&path, &rows)?;
        info!(
            subject = self.config.subject,
            electrode,
            set = %set,
            rows = rows.len(),
            path = %path.display(),
            "built manifest"
        );
        Ok(path)
    }

    /// Build manifests of the configured set for every electrode in parallel.
    ///
    /// Paths are returned in the order of `electrodes`.
    pub fn build_all(&self, electrodes: &[Electrode]) -> Result<Vec<PathBuf>, IndexError> {
        let set = self.set_name();
        electrodes
            .par_iter()
            .map(|electrode| self.build_index(*electrode, set))
            .collect()
    }

    /// Rows of `(electrode, set)` computed with the configured seed, without writing.
    pub fn manifest_rows(
        &self,
        electrode: Electrode,
        set: SetName,
    ) -> Result<Vec<ManifestRow>, IndexError> {
        self.manifest_rows_with(electrode, set, &mut SeededShuffle::new(self.config.seed))
    }

    /// Rows of `(electrode, set)` using an explicit hour permutation.
    pub fn manifest_rows_with(
        &self,
        electrode: Electrode,
        set: SetName,
        shuffler: &mut dyn HourShuffler,
    ) -> Result<Vec<ManifestRow>, IndexError> {
        let pattern = ElectrodePattern::new(electrode, self.config.extension.as_str());
        if set.is_held_out() {
            let catalog = FileCatalog::scan_with(
                &self.scanner(&self.config.roots.test_root),
                self.config.subject,
                pattern,
                false,
            )?;
            return Ok(catalog.entries().iter().map(ManifestRow::from_entry).collect());
        }

        let registry = self.require_registry(set)?;
        let mut catalog = FileCatalog::scan_with(
            &self.scanner(&self.config.roots.train_root),
            self.config.subject,
            pattern,
            true,
        )?;
        catalog.retain_safe(registry);
        if catalog.is_empty() {
            return Err(IndexError::NoMatchingFiles {
                dir: catalog.dir().to_path_buf(),
                pattern: format!("{} (safe recordings only)", catalog.pattern()),
            });
        }

        let mode = if set.is_validation_split() {
            SplitMode::validate(self.config.train_percent)?
        } else {
            SplitMode::Full
        };
        let outcome = self.policy.split(&catalog, mode, shuffler)?;
        let subset = if set.is_training() {
            Subset::Train
        } else {
            Subset::Validation
        };
        let mut rows = outcome.into_rows(subset);
        if set.is_training() {
            rows.extend(self.old_test_rows(electrode, set, registry)?);
        }
        Ok(rows)
    }

    /// Safe, positive held-out recordings from the old-test tree, as rows
    /// relative to the manifest directory.
    fn old_test_rows(
        &self,
        electrode: Electrode,
        set: SetName,
        registry: &SafetyRegistry,
    ) -> Result<Vec<ManifestRow>, IndexError> {
        let Some(old_test_root) = &self.config.roots.old_test_root else {
            return Ok(Vec::new());
        };
        let pattern = ElectrodePattern::new(electrode, self.config.extension.as_str());
        let catalog = match FileCatalog::scan_with(
            &self.scanner(old_test_root),
            self.config.subject,
            pattern,
            false,
        ) {
            Ok(catalog) => catalog,
            Err(IndexError::NoMatchingFiles { dir, pattern }) => {
                debug!(dir = %dir.display(), pattern = %pattern, "no old test recordings to add");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };
        // both sides canonical so mixed relative/absolute roots diff correctly
        let manifest_dir = fs::canonicalize(source_dir(&self.config, set))?;
        let old_test_dir = fs::canonicalize(old_test_root)?;
        let rows: Vec<ManifestRow> = catalog
            .entries()
            .iter()
            .filter(|entry| {
                registry.entry(&entry.file_name).is_some_and(|safety| {
                    safety.safe && safety.class == Some(Label::Positive)
                })
            })
            .map(|entry| {
                let target = old_test_dir.join(&entry.file_name);
                let rel = relative_path(&manifest_dir, &target);
                ManifestRow::new(rel.to_string_lossy().into_owned(), Label::Positive.as_digit())
            })
            .collect();
        debug!(
            dir = %old_test_root.display(),
            electrode,
            added = rows.len(),
            "added old test recordings"
        );
        Ok(rows)
    }

    fn scanner(&self, dir: &Path) -> DirScanner {
        DirScanner::new(dir).with_follow_symlinks(self.config.follow_links)
    }

    fn require_registry(&self, set: SetName) -> Result<&SafetyRegistry, IndexError> {
        self.registry.as_ref().ok_or_else(|| {
            IndexError::Configuration(format!(
                "set '{set}' needs safety metadata, but the indexer was configured for held-out inference"
            ))
        })
    }
}

fn source_dir(config: &IndexerConfig, set: SetName) -> &Path {
    if set.is_held_out() {
        &config.roots.test_root
    } else {
        &config.roots.train_root
    }
}

fn require_dir(path: &Path) -> Result<(), IndexError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(IndexError::MissingDirectory {
            path: path.to_path_buf(),
        })
    }
}
