//! Test doubles shared by the unit tests of this crate.

use std::path::Path;
use std::sync::{Arc, Mutex};

use convirt_common::config::ConvirtConfig;
use convirt_common::error::Result;

use crate::command::{CommandOutput, Executables, Executor, Repo};

/// Executor that records every command line instead of running it.
///
/// `systemctl list-units` answers with the configured listing; any command
/// containing the failure marker exits with status 1.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<Vec<String>>>,
    list_units: Mutex<String>,
    fail_marker: Option<String>,
}

impl RecordingExecutor {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn set_list_units(&self, output: &str) {
        *self.list_units.lock().unwrap() = output.to_string();
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls with the `list-units` polls filtered out.
    pub fn lifecycle_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|argv| !argv.iter().any(|a| a == "list-units"))
            .collect()
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, argv: &[String]) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(argv.to_vec());
        if let Some(marker) = &self.fail_marker {
            if argv.iter().any(|a| a == marker) {
                return Ok(CommandOutput {
                    status: Some(1),
                    stdout: String::new(),
                    stderr: format!("{marker} refused"),
                });
            }
        }
        if argv.iter().any(|a| a == "list-units") {
            return Ok(CommandOutput::ok(self.list_units.lock().unwrap().clone()));
        }
        Ok(CommandOutput::ok(""))
    }
}

pub fn fake_executables() -> Executables {
    Executables::new()
        .with_override("systemctl", "/usr/bin/systemctl")
        .with_override("systemd-run", "/usr/bin/systemd-run")
        .with_override("sudo", "/usr/bin/sudo")
        .with_override("rkt", "/usr/bin/rkt")
        .with_override("docker", "/usr/bin/docker")
        .with_override("sleep", "/bin/sleep")
}

pub fn fake_repo() -> (Arc<RecordingExecutor>, Arc<Repo>) {
    let executor = Arc::new(RecordingExecutor::default());
    let repo = Arc::new(Repo::new(fake_executables(), executor.clone()));
    (executor, repo)
}

pub fn conf_in(run_dir: &Path) -> Arc<ConvirtConfig> {
    Arc::new(ConvirtConfig {
        run_dir: run_dir.to_path_buf(),
        ..ConvirtConfig::default()
    })
}
