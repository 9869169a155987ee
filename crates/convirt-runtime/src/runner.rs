//! systemd-backed lifecycle of one transient unit.
//!
//! A [`Runner`] owns the unit name derived from a runtime identifier and
//! remembers the last transition it commanded. That flag is a local record,
//! not a live poll: a unit dying on its own is only noticed through
//! [`Runner::refresh`].

use std::sync::Arc;

use convirt_common::config::ConvirtConfig;
use convirt_common::constants;
use convirt_common::error::Result;
use convirt_common::types::RuntimeId;
use serde::{Deserialize, Serialize};

use crate::command::{Repo, SUDO, SYSTEMCTL, SYSTEMD_RUN};
use crate::discovery;

/// Accounting properties enabled on every transient unit.
const ACCOUNTING_PROPERTIES: [&str; 3] = [
    "--property=CPUAccounting=1",
    "--property=MemoryAccounting=1",
    "--property=BlockIOAccounting=1",
];

/// One resource usage sample of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStat {
    /// Name of the sampled counter.
    pub name: String,
    /// Counter value.
    pub value: u64,
}

/// Issues systemd commands for a single named unit.
#[derive(Debug)]
pub struct Runner {
    runtime_id: RuntimeId,
    unit_name: String,
    conf: Arc<ConvirtConfig>,
    repo: Arc<Repo>,
    sudo: bool,
    running: bool,
}

impl Runner {
    /// Creates a runner for the unit of `runtime_id`. Nothing is executed.
    #[must_use]
    pub fn new(runtime_id: RuntimeId, conf: Arc<ConvirtConfig>, repo: Arc<Repo>) -> Self {
        let unit_name = constants::unit_name(runtime_id.as_str());
        let sudo = conf.needs_sudo();
        Self {
            runtime_id,
            unit_name,
            conf,
            repo,
            sudo,
            running: false,
        }
    }

    /// Overrides whether commands are prefixed with `sudo`.
    ///
    /// By default the prefix is used when configured and the process is not
    /// already root.
    #[must_use]
    pub const fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Returns the systemd unit name.
    #[must_use]
    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    /// Returns the runtime identifier embedded in the unit name.
    #[must_use]
    pub const fn runtime_id(&self) -> &RuntimeId {
        &self.runtime_id
    }

    /// Returns the last commanded state.
    #[must_use]
    pub const fn running(&self) -> bool {
        self.running
    }

    /// Launches `argv` as an accounted transient unit.
    ///
    /// # Errors
    ///
    /// Returns an error if `systemd-run` cannot be resolved or exits
    /// nonzero. The cached flag is left untouched on failure.
    pub fn start(&mut self, argv: &[String]) -> Result<()> {
        let cmd = self.start_command(argv)?;
        tracing::debug!(unit = %self.unit_name, "starting unit");
        self.call(cmd)?;
        self.running = true;
        tracing::info!(unit = %self.unit_name, "unit started");
        Ok(())
    }

    /// Stops the unit.
    ///
    /// # Errors
    ///
    /// Returns an error if `systemctl` cannot be resolved or exits nonzero.
    pub fn stop(&mut self) -> Result<()> {
        let cmd = vec![
            self.repo.executables().command(SYSTEMCTL)?,
            "stop".to_string(),
            self.unit_name.clone(),
        ];
        tracing::debug!(unit = %self.unit_name, "stopping unit");
        self.call(cmd)?;
        self.running = false;
        tracing::info!(unit = %self.unit_name, "unit stopped");
        Ok(())
    }

    /// Re-derives the cached flag from the units systemd reports as active.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit listing fails.
    pub fn refresh(&mut self) -> Result<bool> {
        let active = discovery::get_all(&self.repo)?.contains(&self.runtime_id);
        if active != self.running {
            tracing::info!(unit = %self.unit_name, active, "unit state changed outside convirt");
        }
        self.running = active;
        Ok(active)
    }

    /// Executes `cmd` synchronously, prefixed with `sudo` when configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::OperationFailed`](convirt_common::error::ConvirtError::OperationFailed)
    /// on a nonzero exit status.
    pub fn call(&self, cmd: Vec<String>) -> Result<()> {
        let argv = if self.sudo {
            let mut argv = vec![self.repo.executables().command(SUDO)?];
            argv.extend(cmd);
            argv
        } else {
            cmd
        };
        let _ = self.repo.run(&argv)?;
        Ok(())
    }

    /// Resource usage of the unit. Metrics are collected elsewhere.
    #[must_use]
    pub const fn stats() -> Vec<UnitStat> {
        Vec::new()
    }

    fn start_command(&self, argv: &[String]) -> Result<Vec<String>> {
        let mut cmd = vec![
            self.repo.executables().command(SYSTEMD_RUN)?,
            format!("--unit={}", self.unit_name),
        ];
        if let Some(slice) = &self.conf.cgroup_slice {
            cmd.push(format!("--slice={slice}"));
        }
        cmd.extend(ACCOUNTING_PROPERTIES.iter().map(ToString::to_string));
        if let Some(uid) = self.conf.uid {
            cmd.push(format!("--uid={uid}"));
        }
        if let Some(gid) = self.conf.gid {
            cmd.push(format!("--gid={gid}"));
        }
        cmd.extend_from_slice(argv);
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingExecutor, fake_executables, fake_repo};
    use convirt_common::error::ConvirtError;

    fn runner_with(conf: ConvirtConfig) -> (Arc<RecordingExecutor>, Runner) {
        let (executor, repo) = fake_repo();
        let runner = Runner::new(RuntimeId::new("test"), Arc::new(conf), repo);
        (executor, runner)
    }

    fn sleep_argv() -> Vec<String> {
        vec!["/bin/sleep".into(), "42m".into()]
    }

    #[test]
    fn created_not_running() {
        let (_, runner) = runner_with(ConvirtConfig::default());
        assert!(!runner.running());
        assert_eq!(runner.unit_name(), "convirt-test.service");
    }

    #[test]
    fn start_issues_systemd_run_with_accounting() {
        let (executor, mut runner) = runner_with(ConvirtConfig::default());
        runner.start(&sleep_argv()).unwrap();
        assert!(runner.running());

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        let cmd = &calls[0];
        assert!(cmd[0].ends_with("systemd-run"));
        assert!(cmd.contains(&"--unit=convirt-test.service".to_string()));
        assert!(cmd.contains(&"--slice=machine.slice".to_string()));
        for prop in ACCOUNTING_PROPERTIES {
            assert!(cmd.contains(&prop.to_string()));
        }
        assert_eq!(&cmd[cmd.len() - 2..], sleep_argv().as_slice());
    }

    #[test]
    fn start_applies_identity_and_omits_missing_slice() {
        let (executor, mut runner) = runner_with(ConvirtConfig {
            cgroup_slice: None,
            uid: Some(36),
            gid: Some(107),
            ..ConvirtConfig::default()
        });
        runner.start(&sleep_argv()).unwrap();
        let cmd = &executor.calls()[0];
        assert!(cmd.contains(&"--uid=36".to_string()));
        assert!(cmd.contains(&"--gid=107".to_string()));
        assert!(!cmd.iter().any(|a| a.starts_with("--slice")));
    }

    #[test]
    fn stop_issues_systemctl_stop() {
        let (executor, mut runner) = runner_with(ConvirtConfig::default());
        runner.stop().unwrap();
        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        let cmd = &calls[0];
        assert_eq!(cmd.len(), 3);
        assert!(cmd[0].ends_with("systemctl"));
        assert_eq!(cmd[1], "stop");
        assert_eq!(cmd[2], "convirt-test.service");
    }

    #[test]
    fn sudo_prefixes_whole_stop_invocation() {
        let (executor, runner) = runner_with(ConvirtConfig::default());
        let mut runner = runner.with_sudo(true);
        runner.stop().unwrap();
        let cmd = &executor.calls()[0];
        assert_eq!(cmd.len(), 4);
        assert!(cmd[0].ends_with("sudo"));
        assert!(cmd[1].ends_with("systemctl"));
        assert_eq!(cmd[3], "convirt-test.service");
    }

    #[test]
    fn sudo_prefixes_whole_start_invocation() {
        let (executor, runner) = runner_with(ConvirtConfig::default());
        let mut runner = runner.with_sudo(true);
        runner.start(&sleep_argv()).unwrap();
        let cmd = &executor.calls()[0];
        assert!(cmd[0].ends_with("sudo"));
        assert!(cmd[1].ends_with("systemd-run"));
        assert_eq!(cmd[2], "--unit=convirt-test.service");
        assert_eq!(&cmd[cmd.len() - 2..], sleep_argv().as_slice());
        assert!(runner.running());
    }

    #[test]
    fn no_sudo_prefix_when_disabled() {
        let (executor, runner) = runner_with(ConvirtConfig {
            use_sudo: true,
            ..ConvirtConfig::default()
        });
        let mut runner = runner.with_sudo(false);
        runner.stop().unwrap();
        let cmd = &executor.calls()[0];
        assert_eq!(cmd.len(), 3);
        assert!(cmd[0].ends_with("systemctl"));
    }

    #[test]
    fn cached_flag_follows_last_command() {
        let (_, mut runner) = runner_with(ConvirtConfig::default());
        runner.stop().unwrap();
        assert!(!runner.running());
        runner.start(&sleep_argv()).unwrap();
        runner.start(&sleep_argv()).unwrap();
        assert!(runner.running());
        runner.stop().unwrap();
        runner.stop().unwrap();
        assert!(!runner.running());
    }

    #[test]
    fn failed_start_keeps_flag() {
        let executor = Arc::new(RecordingExecutor::failing_on("--property=CPUAccounting=1"));
        let repo = Arc::new(Repo::new(fake_executables(), executor));
        let mut runner = Runner::new(
            RuntimeId::new("test"),
            Arc::new(ConvirtConfig::default()),
            repo,
        );
        let err = runner.start(&sleep_argv()).unwrap_err();
        assert!(matches!(err, ConvirtError::OperationFailed { .. }));
        assert!(!runner.running());
    }

    #[test]
    fn refresh_reads_active_units() {
        let (executor, mut runner) = runner_with(ConvirtConfig::default());
        executor.set_list_units("convirt-test.service loaded active running /bin/sleep 42m\n");
        assert!(runner.refresh().unwrap());
        assert!(runner.running());

        executor.set_list_units("");
        assert!(!runner.refresh().unwrap());
        assert!(!runner.running());
    }

    #[test]
    fn stats_pristine() {
        assert!(Runner::stats().is_empty());
    }
}
