//! `convirtctl reset`: stop and restart the unit of a domain.

use clap::Args;
use convirt_domain::DomainContext;

/// Arguments for the `reset` command.
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Domain UUID.
    pub uuid: String,
}

/// Executes the `reset` command.
///
/// # Errors
///
/// Returns an error if the domain is not live or the restart fails.
pub fn execute(args: &ResetArgs, ctx: &DomainContext) -> anyhow::Result<()> {
    let domain = super::lookup(ctx, &args.uuid)?;
    domain.reset(0)?;
    tracing::info!(vm_id = %domain.vm_id(), "domain reset");
    Ok(())
}
