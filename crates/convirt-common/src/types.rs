//! Domain primitive types used across the convirt workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConvirtError;

/// Stable external identifier of a domain, taken from the descriptor `<uuid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VmId(Uuid);

impl VmId {
    /// Wraps an existing UUID.
    #[must_use]
    pub const fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generates a random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the identifier as a 128-bit integer.
    #[must_use]
    pub const fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for VmId {
    type Err = ConvirtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ConvirtError::config(format!("invalid domain uuid {s:?}: {e}")))
    }
}

/// Identifier under which a runtime registers its transient unit.
///
/// Equal to the domain's [`VmId`] for freshly created domains; recovered
/// domains keep whatever identifier the live unit was started with, which
/// is not required to be a UUID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuntimeId(String);

impl RuntimeId {
    /// Creates a runtime ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<VmId> for RuntimeId {
    fn from(vm_id: VmId) -> Self {
        Self(vm_id.to_string())
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container engine backing a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// CoreOS rkt pods.
    Rkt,
    /// Docker containers.
    Docker,
    /// A placeholder workload that only sleeps, for tests and dry runs.
    Fake,
}

impl BackendKind {
    /// Every supported backend, in a stable order.
    pub const ALL: [Self; 3] = [Self::Rkt, Self::Docker, Self::Fake];

    /// Returns the tag used in descriptors for this backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rkt => "rkt",
            Self::Docker => "docker",
            Self::Fake => "fake",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConvirtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| ConvirtError::config(format!("unsupported container type: {tag:?}")))
    }
}

/// Lifecycle state of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeState {
    /// No command line has been computed yet.
    Unconfigured,
    /// A command line is ready but the unit was never started.
    Configured,
    /// The unit was started.
    Running,
    /// The unit was stopped and may be started again.
    Stopped,
    /// The runtime released its resources and cannot be used again.
    TornDown,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfigured => write!(f, "unconfigured"),
            Self::Configured => write!(f, "configured"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::TornDown => write!(f, "torn down"),
        }
    }
}
