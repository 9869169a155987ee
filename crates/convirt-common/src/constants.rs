//! System-wide constants and default paths.

/// Prefix shared by every transient unit convirt creates.
pub const UNIT_PREFIX: &str = "convirt";

/// Unit type suffix of the transient units.
pub const UNIT_SUFFIX: &str = "service";

/// XML namespace of the metadata element naming the container backend.
pub const METADATA_CONTAINERS_URI: &str = "http://ovirt.org/vm/containers/1.0";

/// Local name of the metadata element naming the container backend.
pub const METADATA_CONTAINER_ELEMENT: &str = "container";

/// Default directory for per-runtime state and saved descriptors.
pub const DEFAULT_RUN_DIR: &str = "/var/run/convirt";

/// Default systemd slice the transient units are placed in.
pub const DEFAULT_CGROUP_SLICE: &str = "machine.slice";

/// File name of the persisted unit command line inside a runtime directory.
pub const UNIT_STATE_FILE: &str = "unit.json";

/// File extension of saved domain descriptors.
pub const DESCRIPTOR_EXTENSION: &str = "xml";

/// Environment variable overriding the run directory.
pub const ENV_RUN_DIR: &str = "CONVIRT_RUN_DIR";
/// Environment variable overriding the cgroup slice.
pub const ENV_SLICE: &str = "CONVIRT_SLICE";
/// Environment variable setting the unit uid.
pub const ENV_UID: &str = "CONVIRT_UID";
/// Environment variable setting the unit gid.
pub const ENV_GID: &str = "CONVIRT_GID";
/// Environment variable toggling the `sudo` prefix.
pub const ENV_USE_SUDO: &str = "CONVIRT_USE_SUDO";

/// Application name used in CLI output.
pub const APP_NAME: &str = "convirt";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "convirtctl";

/// Returns the full unit name for a runtime identifier.
///
/// The same format is parsed back by unit discovery, so both sides must
/// agree on it exactly.
#[must_use]
pub fn unit_name(runtime_id: &str) -> String {
    format!("{UNIT_PREFIX}-{runtime_id}.{UNIT_SUFFIX}")
}

/// Returns the pattern matching every convirt unit in `systemctl list-units`.
#[must_use]
pub fn unit_pattern() -> String {
    format!("{UNIT_PREFIX}-*")
}
