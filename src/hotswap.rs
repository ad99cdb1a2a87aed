//! Hot swapping compiled classes into a running VM
//!
//! The debug-attach protocol itself belongs to whatever library the embedder
//! provides; this module only sees it through [`AttachingConnector`] and
//! [`VmSession`]. What lives here is argument binding, connector selection,
//! class-name derivation and the partial-failure policy for redefinition.

use crate::batch::{BatchRunner, FileAction};
use crate::error::TaskError;
use crate::logger::TaskLog;
use crate::scanner::BatchSource;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const FAIL_MSG: &str =
    "Hotswap failed; changes to class(es) might not be compatible with replacement on your VM.";

pub const SHARED_MEMORY_TRANSPORT: &str = "dt_shmem";
pub const SOCKET_TRANSPORT: &str = "dt_socket";

/// Error type used across the VM capability boundary.
pub type VmError = Box<dyn std::error::Error + Send + Sync>;

/// Where to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachTarget {
    SharedMemory { name: String },
    Socket { host: Option<String>, port: String },
}

impl AttachTarget {
    /// Resolve task parameters. A port wins over a name; neither is an error.
    pub fn from_parameters(
        host: Option<String>,
        port: Option<String>,
        name: Option<String>,
    ) -> Result<Self, TaskError> {
        match (port, name) {
            (Some(port), _) => Ok(AttachTarget::Socket { host, port }),
            (None, Some(name)) => Ok(AttachTarget::SharedMemory { name }),
            (None, None) => Err(TaskError::configuration("port is null or name is null")),
        }
    }

    pub fn transport(&self) -> &'static str {
        match self {
            AttachTarget::SharedMemory { .. } => SHARED_MEMORY_TRANSPORT,
            AttachTarget::Socket { .. } => SOCKET_TRANSPORT,
        }
    }
}

/// Connector arguments, keyed by the names the connector advertises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorArguments {
    values: BTreeMap<String, String>,
}

impl ConnectorArguments {
    pub fn new<'k>(keys: impl IntoIterator<Item = &'k str>) -> Self {
        Self {
            values: keys.into_iter().map(|k| (k.to_string(), String::new())).collect(),
        }
    }

    /// Bind a value; the connector must already advertise `key`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), TaskError> {
        match self.values.get_mut(key) {
            Some(slot) => {
                *slot = value.to_string();
                Ok(())
            }
            None => Err(TaskError::Hotswap(format!("connector has no '{}' argument", key))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// A loaded type in the target VM.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassRef {
    pub name: String,
    /// Distinguishes same-named classes from different loaders.
    pub id: u64,
}

/// One way of attaching to a VM.
pub trait AttachingConnector {
    fn transport(&self) -> &str;
    fn default_arguments(&self) -> ConnectorArguments;
    fn attach(&self, args: &ConnectorArguments) -> Result<Box<dyn VmSession>, VmError>;
}

/// An attached VM.
pub trait VmSession {
    fn can_redefine_classes(&self) -> bool;
    fn classes_by_name(&self, name: &str) -> Vec<ClassRef>;
    fn redefine_class(&mut self, class: &ClassRef, bytes: &[u8]) -> Result<(), VmError>;

    fn disconnect(&mut self) -> Result<(), VmError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedefineOutcome {
    /// The class is not loaded in the VM.
    Skipped,
    /// Every loaded copy was redefined.
    Redefined(usize),
    /// Some copies were redefined and some failed.
    Partial { redefined: usize, failed: usize },
}

/// An attached session able to replace classes.
pub struct HotSwapper {
    session: Box<dyn VmSession>,
}

impl HotSwapper {
    /// Pick the first connector for the target's transport, bind its
    /// arguments and attach.
    pub fn connect(connectors: &[Box<dyn AttachingConnector>], target: &AttachTarget) -> Result<Self, TaskError> {
        let transport = target.transport();
        let connector = connectors
            .iter()
            .find(|c| c.transport() == transport)
            .ok_or_else(|| TaskError::Hotswap(format!("cannot find {} connector", transport)))?;

        let mut args = connector.default_arguments();
        match target {
            AttachTarget::SharedMemory { name } => args.set("name", name)?,
            AttachTarget::Socket { host, port } => {
                args.set("port", port)?;
                if let Some(host) = host {
                    args.set("hostname", host)?;
                }
            }
        }

        let session = connector
            .attach(&args)
            .map_err(|e| TaskError::Hotswap(format!("attach failed: {}", e)))?;

        if !session.can_redefine_classes() {
            return Err(TaskError::Hotswap("VM doesn't support class replacement".to_string()));
        }

        tracing::debug!("attached via {}", transport);
        Ok(Self { session })
    }

    /// Redefine every loaded copy of `class_name` with the bytes of `class_file`.
    pub fn replace(
        &mut self,
        class_file: &Path,
        class_name: &str,
        log: &mut dyn TaskLog,
    ) -> Result<RedefineOutcome, TaskError> {
        let bytes = fs::read(class_file).map_err(|e| TaskError::io(class_file, e))?;

        let classes = self.session.classes_by_name(class_name);
        if classes.is_empty() {
            return Ok(RedefineOutcome::Skipped);
        }

        let mut redefined = 0;
        let mut errors = Vec::new();
        for class in &classes {
            match self.session.redefine_class(class, &bytes) {
                Ok(()) => redefined += 1,
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            return Ok(RedefineOutcome::Redefined(redefined));
        }
        if redefined == 0 {
            return Err(TaskError::Hotswap(format!("{}: {}", class_name, errors[0])));
        }

        log.warn(&format!(
            "{} has multiple occurrences: {} were successfully reloaded, {} failed ({})",
            class_name,
            redefined,
            errors.len(),
            errors[0]
        ));
        Ok(RedefineOutcome::Partial {
            redefined,
            failed: errors.len(),
        })
    }

    pub fn disconnect(mut self) -> Result<(), TaskError> {
        self.session
            .disconnect()
            .map_err(|e| TaskError::Hotswap(format!("disconnect failed: {}", e)))
    }
}

/// Fully qualified class name for a `.class` path relative to a class root.
pub fn class_name_for(relative: &Path) -> Option<String> {
    let path = relative.to_string_lossy();
    let stem = path.strip_suffix(".class")?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.replace(['/', '\\'], "."))
}

/// Result of a hotswap run.
#[derive(Debug, Clone, Default)]
pub struct HotswapSummary {
    pub classes: Vec<(String, RedefineOutcome)>,
    pub skipped: Vec<String>,
}

pub struct HotswapTask {
    target: AttachTarget,
    filesets: Vec<Box<dyn BatchSource>>,
    verbose: bool,
    fail_on_error: bool,
}

impl HotswapTask {
    pub fn new(target: AttachTarget) -> Self {
        Self {
            target,
            filesets: Vec::new(),
            verbose: false,
            fail_on_error: true,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    pub fn with_fileset(mut self, source: impl BatchSource + 'static) -> Self {
        self.filesets.push(Box::new(source));
        self
    }

    pub fn check_parameters(&self) -> Result<(), TaskError> {
        if self.filesets.is_empty() {
            return Err(TaskError::configuration(
                "At least one directory or file set must be given.",
            ));
        }
        Ok(())
    }

    /// Attach, replace every class in the file sets, then disconnect.
    pub fn execute(
        &self,
        connectors: &[Box<dyn AttachingConnector>],
        log: &mut dyn TaskLog,
    ) -> Result<HotswapSummary, TaskError> {
        self.check_parameters()?;

        let mut runner = BatchRunner::new(self.fail_on_error, FAIL_MSG, log);

        let swapper = match HotSwapper::connect(connectors, &self.target) {
            Ok(swapper) => swapper,
            Err(err) => {
                runner.recover(err)?;
                return Ok(HotswapSummary {
                    classes: Vec::new(),
                    skipped: runner.into_skipped(),
                });
            }
        };

        let mut action = HotswapAction {
            swapper,
            verbose: self.verbose,
            classes: Vec::new(),
        };
        let swapped = runner.run_sources(&mut action, &self.filesets);

        // The session is closed even when a class aborted the run.
        let HotswapAction { swapper, classes, .. } = action;
        let disconnected = swapper.disconnect();
        swapped?;
        if let Err(err) = disconnected {
            runner.recover(err)?;
        }

        Ok(HotswapSummary {
            classes,
            skipped: runner.into_skipped(),
        })
    }
}

struct HotswapAction {
    swapper: HotSwapper,
    verbose: bool,
    classes: Vec<(String, RedefineOutcome)>,
}

impl FileAction for HotswapAction {
    fn verb(&self) -> &'static str {
        "hotswapping"
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn apply(&mut self, base: &Path, relative: &Path, log: &mut dyn TaskLog) -> Result<(), TaskError> {
        let Some(class_name) = class_name_for(relative) else {
            tracing::debug!("skipping {} (not a class file)", relative.display());
            return Ok(());
        };

        if self.verbose {
            log.info(&format!("hotswapping {}", class_name));
        }

        let outcome = self.swapper.replace(&base.join(relative), &class_name, log)?;
        self.classes.push((class_name, outcome));
        Ok(())
    }
}
