//! `convirtctl list`: show the domains backed by live units.

use clap::Args;
use convirt_domain::DomainContext;
use convirt_domain::recovery::recover_all;

use crate::output;

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print the domain UUIDs only.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Executes the `list` command.
///
/// # Errors
///
/// Returns an error if the live units cannot be listed.
pub fn execute(args: &ListArgs, ctx: &DomainContext) -> anyhow::Result<()> {
    let _ = recover_all(ctx)?;
    let domains = ctx.registry.get_all()?;

    if args.quiet {
        for domain in &domains {
            println!("{}", domain.uuid_string());
        }
        return Ok(());
    }
    if domains.is_empty() {
        println!("No domains found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<8} {:<8} {:<6} {:<10}",
        "UUID", "STATE", "BACKEND", "VCPUS", "MEMORY"
    );
    for domain in &domains {
        let info = domain.info();
        println!(
            "{:<38} {:<8} {:<8} {:<6} {:<10}",
            domain.uuid_string(),
            output::domain_state(info.state),
            domain.backend().as_str(),
            info.nr_virt_cpu,
            output::format_memory(info.memory_kib),
        );
    }
    Ok(())
}
