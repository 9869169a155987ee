//! `convirtctl recover`: rebind domains to the units that outlived us.

use convirt_domain::DomainContext;
use convirt_domain::recovery::recover_all;

/// Executes the `recover` command.
///
/// # Errors
///
/// Returns an error if the live units cannot be listed.
pub fn execute(ctx: &DomainContext) -> anyhow::Result<()> {
    let recovered = recover_all(ctx)?;
    for domain in &recovered {
        println!("recovered {} ({})", domain.uuid_string(), domain.runtime_uuid_string());
    }
    println!("{} domain(s) recovered", recovered.len());
    Ok(())
}
