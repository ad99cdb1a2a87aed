//! fileswap: streaming literal search/replace over file sets
//!
//! The library holds the replace engine, file set scanning, the shared batch
//! traversal, and the hotswap task surface. The binary is at src/main.rs.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod error_helpers;
pub mod hotswap;
pub mod logger;
pub mod replace_task;
pub mod replacer;
pub mod scanner;
pub mod summary_formatter;

// Re-export commonly used types for convenience
pub use batch::{BatchRunner, FileAction};
pub use error::TaskError;
pub use hotswap::{AttachTarget, AttachingConnector, HotSwapper, HotswapTask, VmSession};
pub use logger::{MemoryLog, TaskLog, TracingLog};
pub use replace_task::{ReplaceTask, TaskSummary};
pub use replacer::{FileResult, ReplaceJob, DEFAULT_CHUNK_SIZE};
pub use scanner::{BatchSource, FileSet, FileSetSpec};
