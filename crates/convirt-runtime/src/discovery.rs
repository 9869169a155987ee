//! Discovery of live convirt units.
//!
//! Lists the active units whose names follow the `convirt-<id>.service`
//! convention and extracts the embedded runtime identifiers. Used for
//! inventory and to recover domains after a restart.

use convirt_common::constants::{UNIT_PREFIX, UNIT_SUFFIX, unit_pattern};
use convirt_common::error::Result;
use convirt_common::types::RuntimeId;

use crate::command::{Repo, SYSTEMCTL};

/// Status markers `systemctl` prints in front of failed or degraded units.
const STATUS_BULLETS: [&str; 2] = ["●", "*"];

/// Returns the runtime identifiers of every active convirt unit.
///
/// # Errors
///
/// Returns an error if `systemctl` cannot be resolved or exits nonzero.
pub fn get_all(repo: &Repo) -> Result<Vec<RuntimeId>> {
    let cmd = vec![
        repo.executables().command(SYSTEMCTL)?,
        "list-units".to_string(),
        "--no-pager".to_string(),
        "--no-legend".to_string(),
        unit_pattern(),
    ];
    let output = repo.run(&cmd)?;
    let ids = parse_list_units(&output.stdout);
    tracing::debug!(count = ids.len(), "discovered convirt units");
    Ok(ids)
}

/// Extracts runtime identifiers from `systemctl list-units` output.
///
/// Only the leading token of each line is considered; lines whose unit does
/// not carry the convirt prefix and suffix are skipped.
#[must_use]
pub fn parse_list_units(output: &str) -> Vec<RuntimeId> {
    output
        .lines()
        .filter_map(leading_unit)
        .filter_map(runtime_id_from_unit)
        .collect()
}

/// Strips prefix and suffix from a unit name.
///
/// Returns `None` unless `unit` is exactly `convirt-<id>.service` with a
/// non-empty `<id>`.
#[must_use]
pub fn runtime_id_from_unit(unit: &str) -> Option<RuntimeId> {
    let id = unit
        .strip_prefix(UNIT_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(UNIT_SUFFIX)?
        .strip_suffix('.')?;
    (!id.is_empty()).then(|| RuntimeId::new(id))
}

fn leading_unit(line: &str) -> Option<&str> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    if STATUS_BULLETS.contains(&first) {
        tokens.next()
    } else {
        Some(first)
    }
}
