//! Error types shared by the replace and hotswap tasks

use crate::error_helpers;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    /// Caller contract violation, raised before any file is touched.
    #[error("{0}")]
    Configuration(String),

    /// A batch's base directory (or a directory below it) could not be scanned.
    #[error("cannot scan directory {}: {source}", path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading, writing or swapping a single file failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The attached VM refused or failed a class redefinition.
    #[error("{0}")]
    Hotswap(String),
}

impl TaskError {
    pub fn configuration(message: impl Into<String>) -> Self {
        TaskError::Configuration(message.into())
    }

    pub fn access(path: &Path, source: io::Error) -> Self {
        TaskError::Access {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        TaskError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error aborts the run.
    ///
    /// Configuration errors always do; everything else only under fail-on-error.
    pub fn is_fatal(&self, fail_on_error: bool) -> bool {
        matches!(self, TaskError::Configuration(_)) || fail_on_error
    }

    /// Actionable advice for common filesystem failures, if any applies.
    pub fn hint(&self) -> Option<String> {
        let (path, source, operation) = match self {
            TaskError::Access { path, source } => (path, source, "scanning"),
            TaskError::Io { path, source } => (path, source, "rewriting"),
            _ => return None,
        };

        if error_helpers::is_permission_denied(source) {
            Some(error_helpers::permission_error(path, operation))
        } else if error_helpers::is_not_found(source) {
            Some(error_helpers::not_found_error(path, operation))
        } else {
            None
        }
    }
}
