//! Container runtime abstraction.
//!
//! A [`Runtime`] is the backend-specific execution handle of one domain.
//! All backends share the same lifecycle, implemented once by
//! [`ContainerRuntime`]; what differs between engines is only the command
//! line launched inside the transient unit, described by [`Backend`].

pub mod docker;
pub mod fake;
pub mod rkt;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use convirt_common::config::ConvirtConfig;
use convirt_common::constants::UNIT_STATE_FILE;
use convirt_common::error::{ConvirtError, Result};
use convirt_common::types::{BackendKind, RuntimeId, RuntimeState};
use serde::{Deserialize, Serialize};

use crate::command::Repo;
use crate::descriptor::DomainSpec;
use crate::runner::Runner;

/// Lifecycle capabilities every container backend provides.
pub trait Runtime: Send {
    /// Identifier the transient unit is registered under.
    fn runtime_id(&self) -> &RuntimeId;

    /// Backend implementing this runtime.
    fn kind(&self) -> BackendKind;

    /// Current lifecycle state.
    fn state(&self) -> RuntimeState;

    /// Returns whether a unit command line is known, so `start` can launch
    /// the workload again after a `stop`.
    fn can_start(&self) -> bool;

    /// Allocates the local resources of the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime directory cannot be created.
    fn setup(&mut self) -> Result<()>;

    /// Translates the descriptor into the unit command line.
    ///
    /// Configuring twice with the same descriptor yields the same command.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor lacks what the backend needs or
    /// the runtime is running.
    fn configure(&mut self, spec: &DomainSpec) -> Result<()>;

    /// Launches the configured command as a transient unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime was never configured or the unit
    /// cannot be started.
    fn start(&mut self) -> Result<()>;

    /// Stops the transient unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit cannot be stopped.
    fn stop(&mut self) -> Result<()>;

    /// Releases the local resources of the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime is still running or its directory
    /// cannot be removed.
    fn teardown(&mut self) -> Result<()>;

    /// Rebuilds the in-memory state from systemd and the runtime directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the units cannot be listed or the saved command
    /// line is unreadable.
    fn resync(&mut self) -> Result<()>;

    /// Returns a status snapshot, refreshed from systemd.
    ///
    /// # Errors
    ///
    /// Returns an error if the units cannot be listed.
    fn status(&mut self) -> Result<RuntimeStatus>;

    /// Engine-side name of the live workload, `None` unless running.
    fn runtime_name(&self) -> Option<String>;
}

/// Point-in-time view of a runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    /// Identifier of the transient unit.
    pub runtime_id: RuntimeId,
    /// Backend implementing the runtime.
    pub backend: BackendKind,
    /// Lifecycle state after the refresh.
    pub state: RuntimeState,
    /// systemd unit name.
    pub unit_name: String,
    /// Whether systemd lists the unit as active.
    pub active: bool,
    /// Engine-side workload name.
    pub runtime_name: Option<String>,
}

/// Locations a backend may use while building its command line.
#[derive(Debug, Clone, Copy)]
pub struct UnitContext<'a> {
    /// Identifier of the transient unit.
    pub runtime_id: &'a RuntimeId,
    /// systemd unit name.
    pub unit_name: &'a str,
    /// Private directory of the runtime.
    pub run_dir: &'a Path,
}

/// Engine-specific part of a runtime.
pub trait Backend: Send {
    /// Tag selecting this backend in descriptors.
    const KIND: BackendKind;

    /// Executable the unit runs.
    const EXECUTABLE: &'static str;

    /// Builds the command line executed inside the transient unit.
    ///
    /// `program` is the resolved path of [`Backend::EXECUTABLE`].
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::Config`] if the descriptor lacks a field the
    /// engine requires.
    fn command_line(
        &self,
        program: String,
        ctx: &UnitContext<'_>,
        spec: &DomainSpec,
    ) -> Result<Vec<String>>;

    /// Engine-side name of the running workload.
    fn runtime_name(&self, ctx: &UnitContext<'_>) -> Option<String>;
}

/// Command line persisted in the runtime directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct UnitState {
    backend: BackendKind,
    command: Vec<String>,
}

/// Lifecycle shared by every backend.
#[derive(Debug)]
pub struct ContainerRuntime<B: Backend> {
    backend: B,
    runtime_id: RuntimeId,
    run_dir: PathBuf,
    repo: Arc<Repo>,
    runner: Runner,
    state: RuntimeState,
    command: Option<Vec<String>>,
}

impl<B: Backend> ContainerRuntime<B> {
    /// Creates an unconfigured runtime. Nothing is executed.
    #[must_use]
    pub fn new(
        backend: B,
        runtime_id: RuntimeId,
        conf: Arc<ConvirtConfig>,
        repo: Arc<Repo>,
    ) -> Self {
        let run_dir = conf.run_dir.join(runtime_id.as_str());
        let runner = Runner::new(runtime_id.clone(), conf, repo.clone());
        Self {
            backend,
            runtime_id,
            run_dir,
            repo,
            runner,
            state: RuntimeState::Unconfigured,
            command: None,
        }
    }

    /// Private directory of the runtime.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Runner driving the transient unit.
    #[must_use]
    pub const fn runner(&self) -> &Runner {
        &self.runner
    }

    fn context(&self) -> UnitContext<'_> {
        UnitContext {
            runtime_id: &self.runtime_id,
            unit_name: self.runner.unit_name(),
            run_dir: &self.run_dir,
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.state == RuntimeState::TornDown {
            return Err(ConvirtError::config(format!(
                "runtime {} was torn down",
                self.runtime_id
            )));
        }
        Ok(())
    }

    fn state_file(&self) -> PathBuf {
        self.run_dir.join(UNIT_STATE_FILE)
    }

    fn save_unit_state(&self, command: &[String]) -> Result<()> {
        let path = self.state_file();
        let json = serde_json::to_string_pretty(&UnitState {
            backend: B::KIND,
            command: command.to_vec(),
        })?;
        std::fs::write(&path, json).map_err(ConvirtError::io(path))
    }

    fn load_unit_state(&self) -> Result<Option<UnitState>> {
        let path = self.state_file();
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).map_err(ConvirtError::io(&path))?;
        let saved: UnitState = serde_json::from_str(&json)?;
        if saved.backend != B::KIND {
            return Err(ConvirtError::config(format!(
                "runtime {} was saved by backend {}, not {}",
                self.runtime_id,
                saved.backend,
                B::KIND
            )));
        }
        Ok(Some(saved))
    }

    /// Aligns the lifecycle state with whether systemd reports the unit.
    fn reconcile(&mut self, active: bool) {
        self.state = match (self.state, active) {
            (RuntimeState::TornDown, _) => RuntimeState::TornDown,
            (_, true) => RuntimeState::Running,
            (RuntimeState::Running, false) => RuntimeState::Stopped,
            (state, false) => state,
        };
    }
}

impl<B: Backend> Runtime for ContainerRuntime<B> {
    fn runtime_id(&self) -> &RuntimeId {
        &self.runtime_id
    }

    fn kind(&self) -> BackendKind {
        B::KIND
    }

    fn state(&self) -> RuntimeState {
        self.state
    }

    fn can_start(&self) -> bool {
        self.state != RuntimeState::TornDown && self.command.is_some()
    }

    fn setup(&mut self) -> Result<()> {
        self.ensure_usable()?;
        std::fs::create_dir_all(&self.run_dir).map_err(ConvirtError::io(&self.run_dir))?;
        tracing::debug!(runtime_id = %self.runtime_id, dir = %self.run_dir.display(), "runtime set up");
        Ok(())
    }

    fn configure(&mut self, spec: &DomainSpec) -> Result<()> {
        self.ensure_usable()?;
        if self.state == RuntimeState::Running {
            return Err(ConvirtError::config(format!(
                "runtime {} is running and cannot be reconfigured",
                self.runtime_id
            )));
        }
        let program = self.repo.executables().command(B::EXECUTABLE)?;
        let command = self.backend.command_line(program, &self.context(), spec)?;
        self.save_unit_state(&command)?;
        tracing::debug!(runtime_id = %self.runtime_id, cmd = ?command, "runtime configured");
        self.command = Some(command);
        self.state = RuntimeState::Configured;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if self.state == RuntimeState::Running {
            return Err(ConvirtError::config(format!(
                "runtime {} is already running",
                self.runtime_id
            )));
        }
        let command = self.command.clone().ok_or_else(|| {
            ConvirtError::config(format!(
                "runtime {} must be configured before start",
                self.runtime_id
            ))
        })?;
        self.runner.start(&command)?;
        self.state = RuntimeState::Running;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.runner.stop()?;
        self.state = RuntimeState::Stopped;
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        if self.state == RuntimeState::Running {
            return Err(ConvirtError::config(format!(
                "runtime {} must be stopped before teardown",
                self.runtime_id
            )));
        }
        match std::fs::remove_dir_all(&self.run_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ConvirtError::io(&self.run_dir)(e)),
        }
        self.command = None;
        self.state = RuntimeState::TornDown;
        tracing::debug!(runtime_id = %self.runtime_id, "runtime torn down");
        Ok(())
    }

    fn resync(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if let Some(saved) = self.load_unit_state()? {
            self.command = Some(saved.command);
            self.state = RuntimeState::Configured;
        }
        let active = self.runner.refresh()?;
        self.reconcile(active);
        if !active && self.command.is_some() {
            self.state = RuntimeState::Stopped;
        }
        tracing::debug!(runtime_id = %self.runtime_id, state = %self.state, "runtime resynced");
        Ok(())
    }

    fn status(&mut self) -> Result<RuntimeStatus> {
        let active = if self.state == RuntimeState::TornDown {
            false
        } else {
            self.runner.refresh()?
        };
        self.reconcile(active);
        Ok(RuntimeStatus {
            runtime_id: self.runtime_id.clone(),
            backend: B::KIND,
            state: self.state,
            unit_name: self.runner.unit_name().to_string(),
            active,
            runtime_name: self.runtime_name(),
        })
    }

    fn runtime_name(&self) -> Option<String> {
        if self.state == RuntimeState::Running {
            self.backend.runtime_name(&self.context())
        } else {
            None
        }
    }
}

/// Instantiates the runtime for `kind`.
///
/// Dispatch over backends happens only here, once per domain.
#[must_use]
pub fn create(
    kind: BackendKind,
    runtime_id: RuntimeId,
    conf: Arc<ConvirtConfig>,
    repo: Arc<Repo>,
) -> Box<dyn Runtime> {
    tracing::debug!(backend = %kind, runtime_id = %runtime_id, "creating runtime");
    match kind {
        BackendKind::Rkt => Box::new(ContainerRuntime::new(rkt::Rkt, runtime_id, conf, repo)),
        BackendKind::Docker => {
            Box::new(ContainerRuntime::new(docker::Docker, runtime_id, conf, repo))
        }
        BackendKind::Fake => Box::new(ContainerRuntime::new(fake::Fake, runtime_id, conf, repo)),
    }
}

/// Returns whether the engine executable of `kind` is installed.
#[must_use]
pub fn available(kind: BackendKind, repo: &Repo) -> bool {
    let executable = match kind {
        BackendKind::Rkt => rkt::Rkt::EXECUTABLE,
        BackendKind::Docker => docker::Docker::EXECUTABLE,
        BackendKind::Fake => fake::Fake::EXECUTABLE,
    };
    repo.executables().is_available(executable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{conf_in, fake_repo};
    use convirt_common::types::VmId;

    fn spec(kind: BackendKind) -> DomainSpec {
        DomainSpec {
            vm_id: VmId::generate(),
            name: Some("test".into()),
            backend: kind,
            memory_kib: None,
            vcpus: 1,
            image: Some("quay.io/app:1.0".into()),
            bridge: None,
        }
    }

    fn fake_runtime(
        dir: &Path,
    ) -> (
        Arc<crate::testing::RecordingExecutor>,
        ContainerRuntime<fake::Fake>,
    ) {
        let (executor, repo) = fake_repo();
        let rt = ContainerRuntime::new(fake::Fake, RuntimeId::new("rt-1"), conf_in(dir), repo);
        (executor, rt)
    }

    #[test]
    fn created_unconfigured_and_unnamed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_, rt) = fake_runtime(dir.path());
        assert_eq!(rt.state(), RuntimeState::Unconfigured);
        assert_eq!(rt.runtime_name(), None);
        assert!(!rt.runner().running());
    }

    #[test]
    fn setup_creates_private_directory_under_run_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_, mut rt) = fake_runtime(dir.path());
        rt.setup().unwrap();
        assert!(rt.run_dir().is_dir());
        assert_ne!(rt.run_dir(), dir.path());
        assert!(rt.run_dir().starts_with(dir.path()));
    }

    #[test]
    fn teardown_removes_private_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_, mut rt) = fake_runtime(dir.path());
        rt.setup().unwrap();
        rt.teardown().unwrap();
        assert!(!rt.run_dir().exists());
        assert_eq!(rt.state(), RuntimeState::TornDown);
        assert!(matches!(rt.setup(), Err(ConvirtError::Config { .. })));
    }

    #[test]
    fn start_before_configure_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (executor, mut rt) = fake_runtime(dir.path());
        rt.setup().unwrap();
        assert!(matches!(rt.start(), Err(ConvirtError::Config { .. })));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn configure_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_, mut rt) = fake_runtime(dir.path());
        let spec = spec(BackendKind::Fake);
        rt.setup().unwrap();
        rt.configure(&spec).unwrap();
        let first = rt.command.clone();
        rt.configure(&spec).unwrap();
        assert_eq!(rt.command, first);
        assert_eq!(rt.state(), RuntimeState::Configured);
    }

    #[test]
    fn full_lifecycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (executor, mut rt) = fake_runtime(dir.path());
        rt.setup().unwrap();
        rt.configure(&spec(BackendKind::Fake)).unwrap();
        rt.start().unwrap();
        assert_eq!(rt.state(), RuntimeState::Running);
        assert_eq!(rt.runtime_name().as_deref(), Some("convirt-rt-1.service"));
        assert!(matches!(rt.configure(&spec(BackendKind::Fake)), Err(ConvirtError::Config { .. })));
        assert!(matches!(rt.teardown(), Err(ConvirtError::Config { .. })));

        rt.stop().unwrap();
        assert_eq!(rt.state(), RuntimeState::Stopped);
        rt.start().unwrap();
        rt.stop().unwrap();
        rt.teardown().unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[0][0].ends_with("systemd-run"));
        assert!(calls[1][0].ends_with("systemctl"));
    }

    #[test]
    fn resync_finds_running_unit_and_saved_command() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_, mut rt) = fake_runtime(dir.path());
        rt.setup().unwrap();
        rt.configure(&spec(BackendKind::Fake)).unwrap();
        let saved = rt.command.clone();

        let (_, repo) = fake_repo();
        let mut recovered =
            ContainerRuntime::new(fake::Fake, RuntimeId::new("rt-1"), conf_in(dir.path()), repo);
        recovered.resync().unwrap();
        assert_eq!(recovered.command, saved);
        assert_eq!(recovered.state(), RuntimeState::Stopped);
    }

    #[test]
    fn resync_marks_listed_unit_running() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (executor, mut rt) = fake_runtime(dir.path());
        executor.set_list_units("convirt-rt-1.service loaded active running /bin/sleep infinity\n");
        rt.resync().unwrap();
        assert_eq!(rt.state(), RuntimeState::Running);
        assert!(rt.runner().running());
        assert!(executor.lifecycle_calls().is_empty());
    }

    #[test]
    fn resync_of_live_unit_without_saved_command_cannot_start() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (executor, mut rt) = fake_runtime(dir.path());
        executor.set_list_units("convirt-rt-1.service loaded active running /bin/sleep infinity\n");
        rt.resync().unwrap();
        assert_eq!(rt.state(), RuntimeState::Running);
        assert!(!rt.can_start());
    }

    #[test]
    fn can_start_follows_configuration() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_, mut rt) = fake_runtime(dir.path());
        assert!(!rt.can_start());
        rt.setup().unwrap();
        rt.configure(&spec(BackendKind::Fake)).unwrap();
        assert!(rt.can_start());
        rt.teardown().unwrap();
        assert!(!rt.can_start());
    }

    #[test]
    fn resync_without_unit_or_state_stays_unconfigured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_, mut rt) = fake_runtime(dir.path());
        rt.resync().unwrap();
        assert_eq!(rt.state(), RuntimeState::Unconfigured);
    }

    #[test]
    fn resync_rejects_state_of_other_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_, mut rt) = fake_runtime(dir.path());
        rt.setup().unwrap();
        rt.configure(&spec(BackendKind::Fake)).unwrap();

        let (_, repo) = fake_repo();
        let mut other =
            ContainerRuntime::new(docker::Docker, RuntimeId::new("rt-1"), conf_in(dir.path()), repo);
        assert!(matches!(other.resync(), Err(ConvirtError::Config { .. })));
    }

    #[test]
    fn status_notices_unit_that_died() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (executor, mut rt) = fake_runtime(dir.path());
        rt.setup().unwrap();
        rt.configure(&spec(BackendKind::Fake)).unwrap();
        rt.start().unwrap();

        executor.set_list_units("");
        let status = rt.status().unwrap();
        assert!(!status.active);
        assert_eq!(status.state, RuntimeState::Stopped);
        assert_eq!(status.unit_name, "convirt-rt-1.service");
        assert_eq!(status.runtime_name, None);
    }

    #[test]
    fn create_dispatches_on_kind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_, repo) = fake_repo();
        for kind in BackendKind::ALL {
            let rt = create(kind, RuntimeId::new("x"), conf_in(dir.path()), repo.clone());
            assert_eq!(rt.kind(), kind);
            assert_eq!(rt.runtime_id().as_str(), "x");
        }
    }

    #[test]
    fn available_checks_engine_executable() {
        let (_, repo) = fake_repo();
        for kind in BackendKind::ALL {
            assert!(available(kind, &repo));
        }
    }
}
