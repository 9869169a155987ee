//! Container runtimes supervised as systemd transient units.
//!
//! Lifecycle calls flow from a [`runtime::Runtime`] to its
//! [`runner::Runner`] and from there to systemd through a
//! [`command::Executor`]; [`discovery`] walks the other way, listing the
//! units that are alive.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod command;
pub mod descriptor;
pub mod discovery;
pub mod runner;
pub mod runtime;

#[cfg(test)]
mod testing;
