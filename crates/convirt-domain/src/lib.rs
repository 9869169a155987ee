//! Containers presented as virtual machine domains.
//!
//! A [`domain::Domain`] parses a libvirt-style descriptor, drives a
//! container runtime through its lifecycle, and registers itself in a
//! [`registry::Registry`] shared through a [`context::DomainContext`].
//! [`recovery::recover_all`] rebinds domains to the units that survived a
//! restart.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod context;
pub mod descriptor_file;
pub mod domain;
pub mod error;
pub mod events;
pub mod info;
pub mod recovery;
pub mod registry;

pub use context::DomainContext;
pub use domain::{Domain, UnsupportedOperation};
pub use error::{VirError, VirErrorCode};
