//! File set scanning
//!
//! Turns a base directory plus include/exclude globs into the explicit lists
//! of files and directories that a batch visits. Patterns are matched against
//! paths relative to the base directory, with `/` as a literal separator and
//! `**` spanning any number of directories.

use crate::error::TaskError;
use glob::{MatchOptions, Pattern};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Explicit contents of one batch, relative to `base`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    pub base: PathBuf,
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

impl FileSet {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            files: Vec::new(),
            dirs: Vec::new(),
        }
    }

    pub fn file(mut self, relative: impl Into<PathBuf>) -> Self {
        self.files.push(relative.into());
        self
    }

    pub fn dir(mut self, relative: impl Into<PathBuf>) -> Self {
        self.dirs.push(relative.into());
        self
    }
}

/// Something that yields a [`FileSet`] when a batch starts.
pub trait BatchSource {
    fn scan(&self) -> Result<FileSet, TaskError>;
}

impl BatchSource for FileSet {
    /// A precomputed set only needs its base directory to exist.
    fn scan(&self) -> Result<FileSet, TaskError> {
        ensure_directory(&self.base)?;
        Ok(self.clone())
    }
}

/// Directory plus include/exclude globs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSetSpec {
    pub dir: PathBuf,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl FileSetSpec {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }
}

impl BatchSource for FileSetSpec {
    /// Walk `dir` and collect matching entries.
    ///
    /// Without include patterns every file is included and no directory is.
    /// Directories are only reported when an include pattern names them.
    fn scan(&self) -> Result<FileSet, TaskError> {
        let includes = compile_patterns(&self.includes)?;
        let excludes = compile_patterns(&self.excludes)?;
        ensure_directory(&self.dir)?;

        let mut file_set = FileSet::new(&self.dir);

        for entry in WalkDir::new(&self.dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.dir).to_path_buf();
                TaskError::access(&path, e.into())
            })?;

            let Ok(relative) = entry.path().strip_prefix(&self.dir) else {
                continue;
            };

            if matches_any(&excludes, relative) {
                continue;
            }

            // Linked directories are neither walked nor searched as files.
            if entry.path_is_symlink() && entry.path().is_dir() {
                tracing::debug!("skipping {} (link to a directory)", relative.display());
                continue;
            }

            if entry.file_type().is_dir() {
                if matches_any(&includes, relative) {
                    file_set.dirs.push(relative.to_path_buf());
                }
            } else if includes.is_empty() || matches_any(&includes, relative) {
                file_set.files.push(relative.to_path_buf());
            }
        }

        Ok(file_set)
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, TaskError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| TaskError::configuration(format!("invalid pattern '{}': {}", p, e)))
        })
        .collect()
}

fn matches_any(patterns: &[Pattern], relative: &Path) -> bool {
    patterns
        .iter()
        .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
}

fn ensure_directory(dir: &Path) -> Result<(), TaskError> {
    let metadata = fs::metadata(dir).map_err(|e| TaskError::access(dir, e))?;
    if !metadata.is_dir() {
        return Err(TaskError::access(
            dir,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }
    Ok(())
}
