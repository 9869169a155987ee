//! Runtime lifecycle through the public API, with systemd replaced by a
//! recording executor.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use convirt_common::config::ConvirtConfig;
use convirt_common::error::{ConvirtError, Result};
use convirt_common::types::{BackendKind, RuntimeId, RuntimeState};
use convirt_runtime::command::{CommandOutput, Executables, Executor, Repo};
use convirt_runtime::descriptor::DomainSpec;
use convirt_runtime::{discovery, runtime};

const UUID: &str = "d7a0005e-ee05-4e61-9fbe-d2e93d59327c";

#[derive(Debug, Default)]
struct Recorder {
    calls: Mutex<Vec<Vec<String>>>,
    listing: Mutex<String>,
}

impl Executor for Recorder {
    fn execute(&self, argv: &[String]) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(argv.to_vec());
        if argv.iter().any(|a| a == "list-units") {
            return Ok(CommandOutput::ok(self.listing.lock().unwrap().clone()));
        }
        Ok(CommandOutput::ok(""))
    }
}

fn repo(recorder: &Arc<Recorder>) -> Arc<Repo> {
    let executables = Executables::new()
        .with_override("systemctl", "/usr/bin/systemctl")
        .with_override("systemd-run", "/usr/bin/systemd-run")
        .with_override("docker", "/usr/bin/docker")
        .with_override("rkt", "/usr/bin/rkt");
    Arc::new(Repo::new(executables, recorder.clone()))
}

fn config(run_dir: &std::path::Path) -> Arc<ConvirtConfig> {
    Arc::new(ConvirtConfig {
        run_dir: run_dir.to_path_buf(),
        cgroup_slice: None,
        uid: Some(1000),
        gid: Some(1000),
        use_sudo: false,
    })
}

fn docker_spec() -> DomainSpec {
    DomainSpec::parse(&format!(
        r#"<domain xmlns:ovirt="http://ovirt.org/vm/containers/1.0">
    <uuid>{UUID}</uuid>
    <memory unit="MiB">64</memory>
    <devices>
        <disk type="file"><source file="redis:7"/></disk>
        <interface type="bridge"><source bridge="ovirtmgmt"/></interface>
    </devices>
    <metadata><ovirt:container>docker</ovirt:container></metadata>
</domain>"#
    ))
    .unwrap()
}

#[test]
fn docker_unit_command_line() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let mut rt = runtime::create(
        BackendKind::Docker,
        RuntimeId::new(UUID),
        config(dir.path()),
        repo(&recorder),
    );

    rt.setup().unwrap();
    rt.configure(&docker_spec()).unwrap();
    rt.start().unwrap();

    let calls = recorder.calls.lock().unwrap().clone();
    assert_eq!(
        calls[0],
        vec![
            "/usr/bin/systemd-run".to_string(),
            format!("--unit=convirt-{UUID}.service"),
            "--property=CPUAccounting=1".to_string(),
            "--property=MemoryAccounting=1".to_string(),
            "--property=BlockIOAccounting=1".to_string(),
            "--uid=1000".to_string(),
            "--gid=1000".to_string(),
            "/usr/bin/docker".to_string(),
            "run".to_string(),
            "--rm".to_string(),
            format!("--name=convirt-{UUID}"),
            "--memory=65536k".to_string(),
            "--cpus=1".to_string(),
            "--network=ovirtmgmt".to_string(),
            "redis:7".to_string(),
        ]
    );
    assert_eq!(rt.runtime_name(), Some(format!("convirt-{UUID}")));
}

#[test]
fn unit_state_survives_new_runtime_instance() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let id = RuntimeId::new(UUID);

    let mut first = runtime::create(BackendKind::Docker, id.clone(), config(dir.path()), repo(&recorder));
    first.setup().unwrap();
    first.configure(&docker_spec()).unwrap();
    first.start().unwrap();

    *recorder.listing.lock().unwrap() = format!("convirt-{UUID}.service loaded active running docker\n");
    let mut second = runtime::create(BackendKind::Docker, id, config(dir.path()), repo(&recorder));
    second.resync().unwrap();
    assert_eq!(second.state(), RuntimeState::Running);

    second.stop().unwrap();
    second.teardown().unwrap();
    assert!(!dir.path().join(UUID).exists());
}

#[test]
fn docker_without_image_cannot_be_configured() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let mut rt = runtime::create(
        BackendKind::Docker,
        RuntimeId::new(UUID),
        config(dir.path()),
        repo(&recorder),
    );
    let mut spec = docker_spec();
    spec.image = None;

    rt.setup().unwrap();
    assert!(matches!(rt.configure(&spec), Err(ConvirtError::Config { .. })));
    assert_eq!(rt.state(), RuntimeState::Unconfigured);
}

#[test]
fn discovery_lists_only_convirt_units() {
    let recorder = Arc::new(Recorder::default());
    *recorder.listing.lock().unwrap() = "\
convirt-a.service loaded active running a
\u{25cf} convirt-b.service loaded failed failed b
sshd.service loaded active running OpenSSH
convirt-.service loaded active running empty
"
    .to_string();

    let ids = discovery::get_all(&repo(&recorder)).unwrap();
    assert_eq!(ids, vec![RuntimeId::new("a"), RuntimeId::new("b")]);
}

#[test]
fn overridden_engine_is_available() {
    let recorder: Arc<dyn Executor> = Arc::new(Recorder::default());
    let repo = Repo::new(
        Executables::new().with_override("docker", "/usr/bin/docker"),
        recorder,
    );
    assert!(runtime::available(BackendKind::Docker, &repo));
}
