//! External command execution and executable lookup.
//!
//! Every lifecycle transition ends up as a process spawned through an
//! [`Executor`]. Production code uses [`SystemExecutor`]; tests substitute a
//! recording fake so nothing touches systemd.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use convirt_common::error::{ConvirtError, Result};

/// systemd unit control tool.
pub const SYSTEMCTL: &str = "systemctl";
/// systemd transient unit launcher.
pub const SYSTEMD_RUN: &str = "systemd-run";
/// Privilege elevation prefix.
pub const SUDO: &str = "sudo";

/// Output from an executed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that exited with status 0 and printed `stdout`.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Returns whether the command exited with status 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }
}

/// Runs external commands synchronously.
pub trait Executor: Send + Sync {
    /// Runs `argv` to completion and captures its output.
    ///
    /// A nonzero exit status is *not* an error at this level; see
    /// [`Repo::run`].
    ///
    /// # Errors
    ///
    /// Returns an error if the command line is empty or the process cannot
    /// be spawned.
    fn execute(&self, argv: &[String]) -> Result<CommandOutput>;
}

/// Executor spawning real processes with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, argv: &[String]) -> Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ConvirtError::config("empty command line"))?;
        tracing::debug!(cmd = ?argv, "executing");
        let output = std::process::Command::new(program)
            .args(args)
            .output()
            .map_err(ConvirtError::io(program))?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Resolves executable names to absolute paths.
///
/// Lookups go through `$PATH` unless an override was registered for the
/// name.
#[derive(Debug, Clone, Default)]
pub struct Executables {
    overrides: HashMap<String, PathBuf>,
}

impl Executables {
    /// Creates a resolver backed by `$PATH` only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `name` to `path`, bypassing the `$PATH` search.
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let _ = self.overrides.insert(name.into(), path.into());
        self
    }

    /// Returns the path of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::NotFound`] if the executable is not installed.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if let Some(path) = self.overrides.get(name) {
            return Ok(path.clone());
        }
        which::which(name).map_err(|_| ConvirtError::NotFound {
            name: name.to_string(),
        })
    }

    /// Returns the path of `name` as a command-line argument.
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::NotFound`] if the executable is not installed.
    pub fn command(&self, name: &str) -> Result<String> {
        self.resolve(name)
            .map(|path| path.to_string_lossy().into_owned())
    }

    /// Returns whether `name` resolves to an executable.
    #[must_use]
    pub fn is_available(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }
}

/// Executable resolver paired with the executor that runs them.
#[derive(Clone)]
pub struct Repo {
    executables: Executables,
    executor: Arc<dyn Executor>,
}

impl Repo {
    /// Creates a repository from its parts.
    #[must_use]
    pub fn new(executables: Executables, executor: Arc<dyn Executor>) -> Self {
        Self {
            executables,
            executor,
        }
    }

    /// Repository resolving through `$PATH` and spawning real processes.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Executables::new(), Arc::new(SystemExecutor))
    }

    /// Returns the executable resolver.
    #[must_use]
    pub const fn executables(&self) -> &Executables {
        &self.executables
    }

    /// Runs `argv` and fails unless it exits with status 0.
    ///
    /// There is no retry: a single nonzero exit is final.
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::OperationFailed`] on a nonzero exit status,
    /// or the executor's error if the process could not be spawned.
    pub fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let output = self.executor.execute(argv)?;
        if !output.success() {
            tracing::warn!(cmd = ?argv, status = ?output.status, "command failed");
            return Err(ConvirtError::OperationFailed {
                command: argv.join(" "),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl fmt::Debug for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repo")
            .field("executables", &self.executables)
            .finish_non_exhaustive()
    }
}
