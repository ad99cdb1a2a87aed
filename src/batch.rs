//! Batch traversal shared by the replace and hotswap tasks
//!
//! A batch is one [`FileSet`]: its explicit files are handled first, then each
//! included directory is walked (last one first) with an explicit worklist.
//! Every file reached is passed to a [`FileAction`] together with its path
//! relative to the batch base. Failures are either raised or logged and
//! skipped, depending on fail-on-error.

use crate::error::TaskError;
use crate::logger::TaskLog;
use crate::scanner::{BatchSource, FileSet};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-file work done by a task.
pub trait FileAction {
    /// Verb used in progress lines, e.g. "searching".
    fn verb(&self) -> &'static str;

    fn is_verbose(&self) -> bool;

    fn apply(&mut self, base: &Path, relative: &Path, log: &mut dyn TaskLog) -> Result<(), TaskError>;
}

/// Runs batches and applies the fail-on-error policy.
pub struct BatchRunner<'a> {
    fail_on_error: bool,
    fail_message: &'static str,
    log: &'a mut dyn TaskLog,
    skipped: Vec<String>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(fail_on_error: bool, fail_message: &'static str, log: &'a mut dyn TaskLog) -> Self {
        Self {
            fail_on_error,
            fail_message,
            log,
            skipped: Vec::new(),
        }
    }

    /// Errors that were logged instead of raised, in order.
    pub fn into_skipped(self) -> Vec<String> {
        self.skipped
    }

    /// Scan and run each source in turn.
    pub fn run_sources<A: FileAction>(
        &mut self,
        action: &mut A,
        sources: &[Box<dyn BatchSource>],
    ) -> Result<(), TaskError> {
        for source in sources {
            match source.scan() {
                Ok(file_set) => self.run_batch(action, &file_set)?,
                Err(err) => self.recover(err)?,
            }
        }
        Ok(())
    }

    /// Run one already-scanned batch.
    pub fn run_batch<A: FileAction>(&mut self, action: &mut A, batch: &FileSet) -> Result<(), TaskError> {
        let display_base = std::path::absolute(&batch.base).unwrap_or_else(|_| batch.base.clone());
        let mut seen_files: HashSet<PathBuf> = HashSet::new();
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();

        if !batch.files.is_empty() {
            self.log.info(&format!(
                "{} {} files from {}",
                action.verb(),
                batch.files.len(),
                display_base.display()
            ));
            for file in &batch.files {
                self.visit_file(action, &batch.base, file, &mut seen_files)?;
            }
        }

        for dir in batch.dirs.iter().rev() {
            if action.is_verbose() {
                self.log.info(&format!(
                    "{} dir {}, {}",
                    action.verb(),
                    display_base.display(),
                    dir.display()
                ));
            }

            let mut pending = vec![dir.clone()];
            while let Some(current) = pending.pop() {
                if !seen_dirs.insert(current.clone()) {
                    continue;
                }

                let children = match list_children(&batch.base, &current) {
                    Ok(children) => children,
                    Err(err) => {
                        self.recover(err)?;
                        continue;
                    }
                };

                let mut subdirs = Vec::new();
                for (relative, is_dir) in children {
                    if is_dir {
                        subdirs.push(relative);
                    } else {
                        self.visit_file(action, &batch.base, &relative, &mut seen_files)?;
                    }
                }
                // Reversed so the worklist pops them in name order.
                pending.extend(subdirs.into_iter().rev());
            }
        }

        Ok(())
    }

    fn visit_file<A: FileAction>(
        &mut self,
        action: &mut A,
        base: &Path,
        relative: &Path,
        seen: &mut HashSet<PathBuf>,
    ) -> Result<(), TaskError> {
        if !seen.insert(relative.to_path_buf()) {
            tracing::debug!("skipping {} (already processed)", relative.display());
            return Ok(());
        }

        match action.apply(base, relative, &mut *self.log) {
            Ok(()) => Ok(()),
            Err(err) => self.recover(err),
        }
    }

    /// Raise `err` if it is fatal, otherwise log it and carry on.
    pub fn recover(&mut self, err: TaskError) -> Result<(), TaskError> {
        if err.is_fatal(self.fail_on_error) {
            return Err(err);
        }

        let detail = err.to_string();
        self.log.warn(self.fail_message);
        self.log.warn(&detail);
        self.skipped.push(detail);
        Ok(())
    }
}

/// Immediate children of `base/relative`, as paths relative to `base`, sorted by name.
fn list_children(base: &Path, relative: &Path) -> Result<Vec<(PathBuf, bool)>, TaskError> {
    let dir = base.join(relative);
    let entries = fs::read_dir(&dir).map_err(|e| TaskError::access(&dir, e))?;

    let mut children = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TaskError::access(&dir, e))?;
        let file_type = entry.file_type().map_err(|e| TaskError::access(&entry.path(), e))?;
        if file_type.is_symlink() && entry.path().is_dir() {
            tracing::debug!("skipping {} (link to a directory)", entry.path().display());
            continue;
        }
        children.push((relative.join(entry.file_name()), file_type.is_dir()));
    }
    children.sort();

    Ok(children)
}
