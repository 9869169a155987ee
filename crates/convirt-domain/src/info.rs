//! Read-only snapshots reported by a domain.
//!
//! Containers have no hypervisor-side counters, so most fields are fixed
//! and the rest come from the descriptor.

use convirt_common::types::RuntimeState;
use serde::{Deserialize, Serialize};

/// Run state as the foreign API reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainState {
    /// State unknown.
    NoState,
    /// The workload is running.
    Running,
    /// The workload is not running.
    Shutoff,
}

impl From<RuntimeState> for DomainState {
    fn from(state: RuntimeState) -> Self {
        match state {
            RuntimeState::Running => Self::Running,
            RuntimeState::Unconfigured
            | RuntimeState::Configured
            | RuntimeState::Stopped
            | RuntimeState::TornDown => Self::Shutoff,
        }
    }
}

/// Basic domain information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    /// Run state.
    pub state: DomainState,
    /// Maximum memory in KiB, 0 when the descriptor sets none.
    pub max_mem_kib: u64,
    /// Current memory in KiB.
    pub memory_kib: u64,
    /// Number of virtual CPUs.
    pub nr_virt_cpu: u32,
    /// CPU time used, always 0.
    pub cpu_time_ns: u64,
}

/// State of the domain's control interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlState {
    /// Accepting commands.
    Ok,
}

/// Control interface snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlInfo {
    /// Interface state.
    pub state: ControlState,
    /// State details, always 0.
    pub details: u32,
    /// Milliseconds spent in the current state, always 0.
    pub state_time_ms: u64,
}

impl Default for ControlInfo {
    fn default() -> Self {
        Self {
            state: ControlState::Ok,
            details: 0,
            state_time_ms: 0,
        }
    }
}

/// Per-vCPU information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcpuInfo {
    /// vCPU number.
    pub number: u32,
    /// Host CPU the vCPU last ran on.
    pub cpu: i32,
    /// CPU time used in nanoseconds.
    pub cpu_time_ns: u64,
}

/// vCPU topology: per-vCPU info plus the host CPU affinity map of each.
///
/// Containers expose no vCPUs, so both lists are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vcpus {
    /// One entry per vCPU.
    pub info: Vec<VcpuInfo>,
    /// Host CPU affinity of each vCPU.
    pub affinity: Vec<Vec<bool>>,
}
