use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::IndexError;
use crate::types::FileName;

/// Filesystem transport that lists the immediate files of one directory.
pub struct DirScanner {
    root: PathBuf,
    follow_links: bool,
}

impl DirScanner {
    /// Create a scanner rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_links: false,
        }
    }

    /// Configure symlink traversal.
    pub fn with_follow_symlinks(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    /// Directory being listed.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Basenames of regular files directly under the root accepted by `keep`, sorted.
    ///
    /// Hidden files are never returned. Entries that cannot be read are dropped.
    pub fn file_names<F>(&self, mut keep: F) -> Result<Vec<FileName>, IndexError>
    where
        F: FnMut(&str) -> bool,
    {
        if !self.root.is_dir() {
            return Err(IndexError::MissingDirectory {
                path: self.root.clone(),
            });
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(self.follow_links)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
        {
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if name.starts_with('.') || !keep(name) {
                continue;
            }
            names.push(name.to_string());
        }
        names.sort();
        Ok(names)
    }
}

/// Path of `target` expressed relative to the directory `base`.
///
/// Both paths are compared component-wise; a shared prefix is stripped and
/// every remaining `base` component becomes `..`. Pass paths of the same kind
/// (both absolute, ideally canonical); a relative and an absolute path share
/// no prefix.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component<'_>> = base.components().collect();
    let target: Vec<Component<'_>> = target.components().collect();
    let shared = base
        .iter()
        .zip(target.iter())
        .take_while(|(left, right)| left == right)
        .count();
    let mut rel = PathBuf::new();
    for _ in shared..base.len() {
        rel.push("..");
    }
    for component in &target[shared..] {
        rel.push(component.as_os_str());
    }
    rel
}
