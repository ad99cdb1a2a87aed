//! The search/replace task: a [`ReplaceJob`] applied to one or more file sets.

use crate::batch::{BatchRunner, FileAction};
use crate::error::TaskError;
use crate::logger::TaskLog;
use crate::replacer::{FileResult, ReplaceJob};
use crate::scanner::BatchSource;
use serde::Serialize;
use std::path::Path;

pub const FAIL_MSG: &str = "search/replace failed; some files may not have been updated.";

/// Aggregated outcome of a task run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskSummary {
    pub files: Vec<FileResult>,
    /// Errors that were logged and skipped.
    pub skipped: Vec<String>,
    pub dry_run: bool,
}

impl TaskSummary {
    pub fn files_searched(&self) -> usize {
        self.files.len()
    }

    pub fn files_matched(&self) -> usize {
        self.files.iter().filter(|f| f.match_count > 0).count()
    }

    pub fn files_rewritten(&self) -> usize {
        self.files.iter().filter(|f| f.mutated).count()
    }

    pub fn total_matches(&self) -> usize {
        self.files.iter().map(|f| f.match_count).sum()
    }
}

pub struct ReplaceTask {
    job: ReplaceJob,
    filesets: Vec<Box<dyn BatchSource>>,
    fail_on_error: bool,
}

impl ReplaceTask {
    pub fn new(job: ReplaceJob) -> Self {
        Self {
            job,
            filesets: Vec::new(),
            fail_on_error: true,
        }
    }

    pub fn fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    pub fn add_fileset(&mut self, source: impl BatchSource + 'static) {
        self.filesets.push(Box::new(source));
    }

    pub fn with_fileset(mut self, source: impl BatchSource + 'static) -> Self {
        self.add_fileset(source);
        self
    }

    /// Check that there is something to do before touching any file.
    pub fn check_parameters(&self) -> Result<(), TaskError> {
        if self.filesets.is_empty() {
            return Err(TaskError::configuration(
                "At least one directory or file set must be given.",
            ));
        }
        Ok(())
    }

    pub fn execute(&self, log: &mut dyn TaskLog) -> Result<TaskSummary, TaskError> {
        self.check_parameters()?;

        let mut action = ReplaceAction {
            job: &self.job,
            results: Vec::new(),
        };

        let mut runner = BatchRunner::new(self.fail_on_error, FAIL_MSG, log);
        runner.run_sources(&mut action, &self.filesets)?;
        let skipped = runner.into_skipped();

        Ok(TaskSummary {
            files: action.results,
            skipped,
            dry_run: self.job.is_dry_run(),
        })
    }
}

struct ReplaceAction<'a> {
    job: &'a ReplaceJob,
    results: Vec<FileResult>,
}

impl FileAction for ReplaceAction<'_> {
    fn verb(&self) -> &'static str {
        "searching"
    }

    fn is_verbose(&self) -> bool {
        self.job.is_verbose()
    }

    fn apply(&mut self, base: &Path, relative: &Path, log: &mut dyn TaskLog) -> Result<(), TaskError> {
        let path = base.join(relative);
        if self.job.is_verbose() {
            log.info(&format!("searching {}", path.display()));
        }

        let result = self.job.replace_file(&path)?;
        tracing::debug!(
            "{}: {} matches{}",
            path.display(),
            result.match_count,
            if result.mutated { ", rewritten" } else { "" }
        );
        self.results.push(result);
        Ok(())
    }
}
