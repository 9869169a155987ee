//! Domain lifecycle event fan-out.
//!
//! Sinks form a tree: every domain gets a child of the root sink, and an
//! event emitted on a child is delivered to the subscribers of the child and
//! of each of its ancestors.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use convirt_common::types::{RuntimeId, VmId};

/// A domain lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A domain was created and its unit started.
    Started {
        /// Domain that started.
        vm_id: VmId,
        /// Runtime the unit runs under.
        runtime_id: RuntimeId,
    },
    /// A domain was rebuilt around a live unit.
    Recovered {
        /// Recovered domain.
        vm_id: VmId,
        /// Runtime of the live unit.
        runtime_id: RuntimeId,
    },
    /// A domain was stopped and started again.
    Reset {
        /// Domain that was reset.
        vm_id: VmId,
    },
    /// A domain was shut down and unregistered.
    Destroyed {
        /// Domain that was destroyed.
        vm_id: VmId,
    },
}

/// A lifecycle event stamped with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Name of the sink the event was emitted on.
    pub source: String,
    /// Emission time.
    pub at: DateTime<Utc>,
    /// The transition itself.
    pub kind: LifecycleEvent,
}

type Subscriber = Box<dyn Fn(&Event) + Send + Sync>;

/// Node of the event tree.
pub struct EventSink {
    name: String,
    parent: Option<Arc<EventSink>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventSink {
    /// Creates the root of a sink tree.
    #[must_use]
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            name: "root".to_string(),
            parent: None,
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Creates a child sink forwarding to `self`.
    #[must_use]
    pub fn child(self: &Arc<Self>, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(Arc::clone(self)),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Name of this sink.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a callback for events emitted on this sink or below it.
    pub fn subscribe(&self, callback: impl Fn(&Event) + Send + Sync + 'static) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    /// Emits `kind` on this sink.
    pub fn emit(&self, kind: LifecycleEvent) {
        tracing::debug!(sink = %self.name, event = ?kind, "lifecycle event");
        let event = Event {
            source: self.name.clone(),
            at: Utc::now(),
            kind,
        };
        self.dispatch(&event);
    }

    fn dispatch(&self, event: &Event) {
        {
            let subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for subscriber in subscribers.iter() {
                subscriber(event);
            }
        }
        if let Some(parent) = &self.parent {
            parent.dispatch(event);
        }
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.as_str()))
            .finish_non_exhaustive()
    }
}
