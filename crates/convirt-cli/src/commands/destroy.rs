//! `convirtctl destroy`: stop a domain and clean up its resources.

use clap::Args;
use convirt_domain::DomainContext;

/// Arguments for the `destroy` command.
#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Domain UUIDs to destroy.
    #[arg(required = true)]
    pub uuids: Vec<String>,
}

/// Executes the `destroy` command.
///
/// Every UUID is attempted; the command fails if any of them failed.
///
/// # Errors
///
/// Returns an error if a domain is not live or cannot be destroyed.
pub fn execute(args: &DestroyArgs, ctx: &DomainContext) -> anyhow::Result<()> {
    let mut failed = 0_usize;
    for uuid in &args.uuids {
        let result = super::lookup(ctx, uuid)
            .and_then(|domain| domain.destroy().map_err(anyhow::Error::from));
        match result {
            Ok(()) => println!("destroyed {uuid}"),
            Err(e) => {
                tracing::error!(uuid = %uuid, error = %e, "destroy failed");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} domain(s) could not be destroyed", args.uuids.len());
    }
    Ok(())
}
