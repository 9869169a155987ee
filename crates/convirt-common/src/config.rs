//! Global configuration model for convirt.
//!
//! Values come from an optional JSON file and are then overridden by
//! `CONVIRT_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{ConvirtError, Result};

/// Root configuration shared by every runtime and runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvirtConfig {
    /// Directory holding per-runtime state and saved descriptors.
    pub run_dir: PathBuf,
    /// systemd slice the transient units are placed in.
    pub cgroup_slice: Option<String>,
    /// User the workload runs as.
    pub uid: Option<u32>,
    /// Group the workload runs as.
    pub gid: Option<u32>,
    /// Whether systemd commands are prefixed with `sudo`.
    pub use_sudo: bool,
}

impl Default for ConvirtConfig {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::from(constants::DEFAULT_RUN_DIR),
            cgroup_slice: Some(constants::DEFAULT_CGROUP_SLICE.to_string()),
            uid: None,
            gid: None,
            use_sudo: false,
        }
    }
}

impl ConvirtConfig {
    /// Reads a configuration file.
    ///
    /// Missing keys take their default value.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path).map_err(ConvirtError::io(path))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// An empty `CONVIRT_SLICE` removes the slice option entirely.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dir) = lookup(constants::ENV_RUN_DIR) {
            self.run_dir = PathBuf::from(dir);
        }
        if let Some(slice) = lookup(constants::ENV_SLICE) {
            self.cgroup_slice = Some(slice).filter(|s| !s.is_empty());
        }
        if let Some(uid) = lookup(constants::ENV_UID) {
            self.uid = Some(parse_id(constants::ENV_UID, &uid)?);
        }
        if let Some(gid) = lookup(constants::ENV_GID) {
            self.gid = Some(parse_id(constants::ENV_GID, &gid)?);
        }
        if let Some(flag) = lookup(constants::ENV_USE_SUDO) {
            self.use_sudo = parse_flag(constants::ENV_USE_SUDO, &flag)?;
        }
        Ok(self)
    }

    /// Returns whether commands actually need the `sudo` prefix.
    ///
    /// Already running as root makes the prefix redundant.
    #[must_use]
    pub fn needs_sudo(&self) -> bool {
        self.sudo_required(nix::unistd::geteuid().is_root())
    }

    /// Returns whether the `sudo` prefix is needed for a process whose
    /// effective user is root or not.
    #[must_use]
    pub const fn sudo_required(&self, is_root: bool) -> bool {
        self.use_sudo && !is_root
    }
}

fn parse_id(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|e| ConvirtError::config(format!("{key}={value:?}: {e}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConvirtError::config(format!(
            "{key}={other:?} is not a boolean"
        ))),
    }
}
