//! Collaborators shared by every domain of a connection.

use std::sync::Arc;

use convirt_common::config::ConvirtConfig;
use convirt_runtime::command::Repo;

use crate::events::EventSink;
use crate::registry::Registry;

/// Configuration, command repository, registry, and event root handed to
/// each domain at construction.
#[derive(Debug, Clone)]
pub struct DomainContext {
    /// Runner and run directory configuration.
    pub config: Arc<ConvirtConfig>,
    /// Executables and the executor running them.
    pub repo: Arc<Repo>,
    /// Table of active domains.
    pub registry: Arc<Registry>,
    /// Root of the event tree.
    pub events: Arc<EventSink>,
}

impl DomainContext {
    /// Creates a context with an empty registry and a fresh event root.
    #[must_use]
    pub fn new(config: ConvirtConfig, repo: Repo) -> Self {
        Self {
            config: Arc::new(config),
            repo: Arc::new(repo),
            registry: Arc::new(Registry::new()),
            events: EventSink::root(),
        }
    }
}
