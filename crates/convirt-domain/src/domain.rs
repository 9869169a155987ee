//! A container workload seen through the virtual machine lifecycle API.
//!
//! `create` walks a fresh descriptor from unconfigured to running,
//! `recover` rebinds to a unit that outlived the process, and `destroy`
//! tears everything down again. Failures of the lifecycle verbs reach
//! callers only as [`VirError`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use convirt_common::error::{ConvirtError, Result};
use convirt_common::types::{BackendKind, RuntimeId, RuntimeState, VmId};
use convirt_runtime::descriptor::DomainSpec;
use convirt_runtime::discovery;
use convirt_runtime::runtime::{self, Runtime, RuntimeStatus};

use crate::context::DomainContext;
use crate::descriptor_file::DescriptorFile;
use crate::error::VirError;
use crate::events::{EventSink, LifecycleEvent};
use crate::info::{ControlInfo, DomainInfo, DomainState, Vcpus};
use crate::registry::Registry;

/// Operations of the foreign API that domains deliberately do not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedOperation {
    /// Live or offline migration.
    Migrate,
    /// Pause the guest.
    Suspend,
    /// Unpause the guest.
    Resume,
    /// Graceful guest shutdown.
    Shutdown,
    /// Graceful guest reboot.
    Reboot,
    /// Save guest memory to a file.
    Save,
    /// Dump guest memory.
    CoreDump,
    /// Take a snapshot.
    Snapshot,
    /// Change the memory balloon.
    SetMemory,
    /// Hot-plug vCPUs.
    SetVcpus,
    /// Hot-plug a device.
    AttachDevice,
    /// Hot-unplug a device.
    DetachDevice,
    /// Update a device.
    UpdateDevice,
    /// Query block device information.
    BlockInfo,
    /// Set the guest clock.
    SetTime,
}

impl UnsupportedOperation {
    /// Name of the operation in the foreign API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Migrate => "migrate",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Shutdown => "shutdown",
            Self::Reboot => "reboot",
            Self::Save => "save",
            Self::CoreDump => "coreDump",
            Self::Snapshot => "snapshotCreateXML",
            Self::SetMemory => "setMemory",
            Self::SetVcpus => "setVcpus",
            Self::AttachDevice => "attachDevice",
            Self::DetachDevice => "detachDevice",
            Self::UpdateDevice => "updateDeviceFlags",
            Self::BlockInfo => "blockInfo",
            Self::SetTime => "setTime",
        }
    }
}

impl fmt::Display for UnsupportedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One workload exposed as a virtual machine domain.
pub struct Domain {
    vm_id: VmId,
    runtime_id: RuntimeId,
    descriptor: String,
    spec: DomainSpec,
    runtime: Mutex<Box<dyn Runtime>>,
    descriptor_file: DescriptorFile,
    registry: Arc<Registry>,
    events: Arc<EventSink>,
}

impl Domain {
    /// Builds an unregistered domain without touching systemd.
    ///
    /// `runtime_id` defaults to the descriptor UUID.
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::Config`] if the descriptor is malformed or its
    /// container type is missing or unknown.
    pub fn new(
        descriptor: impl Into<String>,
        ctx: &DomainContext,
        runtime_id: Option<RuntimeId>,
    ) -> Result<Self> {
        let descriptor = descriptor.into();
        let spec = DomainSpec::parse(&descriptor)?;
        let vm_id = spec.vm_id;
        let runtime_id = runtime_id.unwrap_or_else(|| RuntimeId::from(vm_id));
        tracing::debug!(vm_id = %vm_id, backend = %spec.backend, "initializing container");

        let runtime = runtime::create(
            spec.backend,
            runtime_id.clone(),
            Arc::clone(&ctx.config),
            Arc::clone(&ctx.repo),
        );
        let descriptor_file = DescriptorFile::new(&ctx.config.run_dir, &runtime_id);
        tracing::debug!(vm_id = %vm_id, runtime_id = %runtime_id, "container initialized");

        Ok(Self {
            vm_id,
            runtime_id,
            descriptor,
            spec,
            runtime: Mutex::new(runtime),
            descriptor_file,
            registry: Arc::clone(&ctx.registry),
            events: ctx.events.child(format!("Domain({vm_id})")),
        })
    }

    /// Creates, starts, and registers a domain from `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::Config`] for a bad descriptor, an already
    /// registered UUID, or a unit that is already live under the same
    /// runtime identifier, or whatever error stopped the startup sequence.
    /// The domain is not registered in either case, and a live unit keeps
    /// its saved descriptor.
    pub fn create(descriptor: impl Into<String>, ctx: &DomainContext) -> Result<Arc<Self>> {
        let domain = Arc::new(Self::new(descriptor, ctx, None)?);
        if ctx.registry.get(&domain.vm_id)?.is_some() {
            return Err(ConvirtError::config(format!(
                "domain {} is already registered",
                domain.vm_id
            )));
        }
        if discovery::get_all(&ctx.repo)?.contains(&domain.runtime_id) {
            return Err(ConvirtError::config(format!(
                "unit of runtime {} is already live",
                domain.runtime_id
            )));
        }
        domain.startup()?;
        ctx.registry.add(Arc::clone(&domain))?;
        domain.events.emit(LifecycleEvent::Started {
            vm_id: domain.vm_id,
            runtime_id: domain.runtime_id.clone(),
        });
        Ok(domain)
    }

    /// Rebinds a domain to the live unit of `runtime_id` and registers it.
    ///
    /// Setup and start are not issued again; the runtime state is rebuilt
    /// from systemd instead.
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::Config`] for a bad descriptor or an already
    /// registered UUID, or the error that stopped the resync.
    pub fn recover(
        runtime_id: RuntimeId,
        descriptor: impl Into<String>,
        ctx: &DomainContext,
    ) -> Result<Arc<Self>> {
        let domain = Arc::new(Self::new(descriptor, ctx, Some(runtime_id))?);
        domain.resync()?;
        ctx.registry.add(Arc::clone(&domain))?;
        domain.events.emit(LifecycleEvent::Recovered {
            vm_id: domain.vm_id,
            runtime_id: domain.runtime_id.clone(),
        });
        Ok(domain)
    }

    /// Shuts the domain down and unregisters it. Same as `destroy_flags(0)`.
    ///
    /// # Errors
    ///
    /// Returns [`VirError`] if the domain is not the registered instance of
    /// its UUID or the shutdown sequence fails.
    pub fn destroy(&self) -> std::result::Result<(), VirError> {
        self.destroy_flags(0)
    }

    /// Shuts the domain down and unregisters it. `flags` are ignored.
    ///
    /// A failure half-way leaves the domain as it is; nothing is rolled
    /// back.
    ///
    /// # Errors
    ///
    /// Returns [`VirError`] if the domain is not the registered instance of
    /// its UUID or the shutdown sequence fails.
    pub fn destroy_flags(&self, _flags: u32) -> std::result::Result<(), VirError> {
        tracing::debug!(vm_id = %self.vm_id, "destroying container");
        self.ensure_registered()
            .and_then(|()| self.shutdown())
            .and_then(|()| self.registry.remove(&self.vm_id).map(drop))
            .map_err(|e| self.fail("destroy", &e))?;
        self.events.emit(LifecycleEvent::Destroyed { vm_id: self.vm_id });
        tracing::info!(vm_id = %self.vm_id, "container destroyed");
        Ok(())
    }

    /// Stops and immediately restarts the unit. `flags` are ignored.
    ///
    /// The runtime is neither torn down nor reconfigured, and the saved
    /// descriptor is kept. A runtime with no known command line is refused
    /// before its unit is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`VirError`] if stopping or starting fails.
    pub fn reset(&self, _flags: u32) -> std::result::Result<(), VirError> {
        tracing::debug!(vm_id = %self.vm_id, "resetting container");
        self.restart().map_err(|e| self.fail("reset", &e))?;
        self.events.emit(LifecycleEvent::Reset { vm_id: self.vm_id });
        Ok(())
    }

    /// Rejects an operation outside the supported surface.
    ///
    /// # Errors
    ///
    /// Always returns a [`VirError`] with the not-supported code.
    pub fn unsupported(&self, operation: UnsupportedOperation) -> std::result::Result<(), VirError> {
        tracing::warn!(vm_id = %self.vm_id, %operation, "unsupported domain operation");
        Err(VirError::no_support(operation.as_str()))
    }

    /// Runtime status refreshed from systemd.
    ///
    /// # Errors
    ///
    /// Returns [`VirError`] if the units cannot be listed.
    pub fn status(&self) -> std::result::Result<RuntimeStatus, VirError> {
        self.lock_runtime()
            .and_then(|mut rt| rt.status())
            .map_err(|e| self.fail("status", &e))
    }

    /// Container backend named in the descriptor.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.spec.backend
    }

    /// Domain UUID.
    #[must_use]
    pub const fn vm_id(&self) -> VmId {
        self.vm_id
    }

    /// Identifier of the unit backing this domain.
    #[must_use]
    pub const fn runtime_id(&self) -> &RuntimeId {
        &self.runtime_id
    }

    /// Numeric domain ID: the UUID as a 128-bit integer.
    #[must_use]
    pub const fn id(&self) -> u128 {
        self.vm_id.as_u128()
    }

    /// Domain UUID as a hyphenated string.
    #[must_use]
    pub fn uuid_string(&self) -> String {
        self.vm_id.to_string()
    }

    /// Runtime identifier as a string.
    #[must_use]
    pub fn runtime_uuid_string(&self) -> String {
        self.runtime_id.to_string()
    }

    /// The descriptor exactly as supplied. `flags` are ignored.
    #[must_use]
    pub fn xml_desc(&self, _flags: u32) -> &str {
        &self.descriptor
    }

    /// Control interface state. `flags` are ignored.
    #[must_use]
    pub fn control_info(&self, _flags: u32) -> ControlInfo {
        ControlInfo::default()
    }

    /// Basic information derived from the descriptor and cached state.
    #[must_use]
    pub fn info(&self) -> DomainInfo {
        let memory_kib = self.spec.memory_kib.unwrap_or(0);
        DomainInfo {
            state: self
                .runtime_state()
                .map_or(DomainState::NoState, DomainState::from),
            max_mem_kib: memory_kib,
            memory_kib,
            nr_virt_cpu: self.spec.vcpus,
            cpu_time_ns: 0,
        }
    }

    /// vCPU topology, always empty.
    #[must_use]
    pub fn vcpus(&self) -> Vcpus {
        Vcpus::default()
    }

    /// Cached runtime state, `None` if the runtime lock is poisoned.
    #[must_use]
    pub fn runtime_state(&self) -> Option<RuntimeState> {
        self.lock_runtime().ok().map(|rt| rt.state())
    }

    /// Engine-side name of the workload while it runs.
    #[must_use]
    pub fn runtime_name(&self) -> Option<String> {
        self.lock_runtime().ok().and_then(|rt| rt.runtime_name())
    }

    fn startup(&self) -> Result<()> {
        let mut rt = self.lock_runtime()?;
        tracing::debug!(vm_id = %self.vm_id, "clearing descriptor cache");
        self.descriptor_file.clear()?;
        tracing::debug!(vm_id = %self.vm_id, "setting up container");
        rt.setup()?;
        tracing::debug!(vm_id = %self.vm_id, "configuring container");
        rt.configure(&self.spec)?;
        tracing::debug!(vm_id = %self.vm_id, "saving descriptor");
        self.descriptor_file.save(&self.descriptor)?;
        tracing::debug!(vm_id = %self.vm_id, "starting container");
        rt.start()?;
        tracing::info!(vm_id = %self.vm_id, runtime_id = %self.runtime_id, "container started");
        Ok(())
    }

    fn resync(&self) -> Result<()> {
        let mut rt = self.lock_runtime()?;
        tracing::debug!(vm_id = %self.vm_id, runtime_id = %self.runtime_id, "resyncing container");
        rt.resync()?;
        tracing::info!(vm_id = %self.vm_id, state = %rt.state(), "container resynced");
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        let mut rt = self.lock_runtime()?;
        tracing::debug!(vm_id = %self.vm_id, "stopping container");
        rt.stop()?;
        tracing::debug!(vm_id = %self.vm_id, "tearing down container");
        rt.teardown()?;
        self.descriptor_file.clear()?;
        Ok(())
    }

    fn restart(&self) -> Result<()> {
        let mut rt = self.lock_runtime()?;
        if !rt.can_start() {
            return Err(ConvirtError::config(format!(
                "runtime {} has no command line to restart with",
                self.runtime_id
            )));
        }
        rt.stop()?;
        tracing::debug!(vm_id = %self.vm_id, "stopped container");
        rt.start()?;
        tracing::debug!(vm_id = %self.vm_id, "restarted container");
        Ok(())
    }

    /// Fails unless the registry holds this very instance under its UUID.
    fn ensure_registered(&self) -> Result<()> {
        let registered = self
            .registry
            .get(&self.vm_id)?
            .is_some_and(|domain| std::ptr::eq(Arc::as_ptr(&domain), self));
        if registered {
            Ok(())
        } else {
            Err(ConvirtError::Lookup {
                kind: "domain",
                id: self.vm_id.to_string(),
            })
        }
    }

    fn lock_runtime(&self) -> Result<MutexGuard<'_, Box<dyn Runtime>>> {
        self.runtime
            .lock()
            .map_err(|_| ConvirtError::config(format!("runtime lock of {} poisoned", self.vm_id)))
    }

    fn fail(&self, operation: &'static str, err: &ConvirtError) -> VirError {
        tracing::error!(vm_id = %self.vm_id, operation, error = %err, "domain operation failed");
        VirError::operation_failed(operation)
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("vm_id", &self.vm_id)
            .field("runtime_id", &self.runtime_id)
            .field("backend", &self.spec.backend)
            .finish_non_exhaustive()
    }
}
