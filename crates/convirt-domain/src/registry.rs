//! Table of the domains active in this process.
//!
//! Nothing here is persisted: after a restart the table starts empty and is
//! rebuilt by discovering live units and recovering them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use convirt_common::error::{ConvirtError, Result};
use convirt_common::types::{RuntimeId, VmId};

use crate::domain::Domain;

/// Registered domains keyed by their [`VmId`].
#[derive(Default)]
pub struct Registry {
    domains: Mutex<BTreeMap<VmId, Arc<Domain>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::Config`] if a domain with the same identifier
    /// is already registered.
    pub fn add(&self, domain: Arc<Domain>) -> Result<()> {
        let vm_id = domain.vm_id();
        let mut domains = self.lock()?;
        if domains.contains_key(&vm_id) {
            return Err(ConvirtError::config(format!(
                "domain {vm_id} is already registered"
            )));
        }
        let _ = domains.insert(vm_id, domain);
        tracing::debug!(vm_id = %vm_id, "domain registered");
        Ok(())
    }

    /// Unregisters the domain of `vm_id` and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::Lookup`] if no such domain is registered.
    pub fn remove(&self, vm_id: &VmId) -> Result<Arc<Domain>> {
        let removed = self.lock()?.remove(vm_id).ok_or_else(|| ConvirtError::Lookup {
            kind: "domain",
            id: vm_id.to_string(),
        })?;
        tracing::debug!(vm_id = %vm_id, "domain unregistered");
        Ok(removed)
    }

    /// Returns the domain of `vm_id`, if registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn get(&self, vm_id: &VmId) -> Result<Option<Arc<Domain>>> {
        Ok(self.lock()?.get(vm_id).cloned())
    }

    /// Returns the registered domain whose unit runs under `runtime_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn find_by_runtime(&self, runtime_id: &RuntimeId) -> Result<Option<Arc<Domain>>> {
        Ok(self
            .lock()?
            .values()
            .find(|domain| domain.runtime_id() == runtime_id)
            .cloned())
    }

    /// Returns a snapshot of every registered domain, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn get_all(&self) -> Result<Vec<Arc<Domain>>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    /// Number of registered domains.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Returns whether no domain is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<VmId, Arc<Domain>>>> {
        self.domains
            .lock()
            .map_err(|_| ConvirtError::config("domain registry lock poisoned"))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self
            .lock()
            .map(|domains| domains.keys().map(ToString::to_string).collect())
            .unwrap_or_default();
        f.debug_struct("Registry").field("domains", &ids).finish()
    }
}
