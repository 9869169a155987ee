//! `convirtctl status`: show the runtime status of one domain.

use clap::Args;
use convirt_domain::DomainContext;

use crate::output;

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Domain UUID.
    pub uuid: String,

    /// Print the status as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `status` command.
///
/// # Errors
///
/// Returns an error if the domain is not live or its unit cannot be
/// queried.
pub fn execute(args: &StatusArgs, ctx: &DomainContext) -> anyhow::Result<()> {
    let domain = super::lookup(ctx, &args.uuid)?;
    let status = domain.status()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let info = domain.info();
    println!("UUID:      {}", domain.uuid_string());
    println!("Runtime:   {}", status.runtime_id);
    println!("Backend:   {}", status.backend);
    println!("Unit:      {}", status.unit_name);
    println!("State:     {} ({})", output::domain_state(info.state), status.state);
    println!("Name:      {}", status.runtime_name.as_deref().unwrap_or("-"));
    println!("vCPUs:     {}", info.nr_virt_cpu);
    println!("Memory:    {}", output::format_memory(info.memory_kib));
    Ok(())
}
