//! `convirtctl check`: report the tools each backend needs.

use convirt_common::types::BackendKind;
use convirt_domain::DomainContext;
use convirt_runtime::command::{SYSTEMCTL, SYSTEMD_RUN};
use convirt_runtime::runtime;

/// Executes the `check` command.
///
/// # Errors
///
/// Returns an error if systemd itself is missing.
pub fn execute(ctx: &DomainContext) -> anyhow::Result<()> {
    let executables = ctx.repo.executables();
    let mut systemd_ok = true;
    for tool in [SYSTEMCTL, SYSTEMD_RUN] {
        let found = executables.is_available(tool);
        systemd_ok &= found;
        println!("{tool:<12} {}", if found { "found" } else { "missing" });
    }
    for kind in BackendKind::ALL {
        let found = runtime::available(kind, &ctx.repo);
        println!("{:<12} {}", kind.as_str(), if found { "available" } else { "unavailable" });
    }
    if !systemd_ok {
        anyhow::bail!("systemd tools are missing; no backend can run");
    }
    Ok(())
}
