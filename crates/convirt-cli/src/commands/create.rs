//! `convirtctl create`: start a domain from a descriptor file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use convirt_domain::recovery::recover_all;
use convirt_domain::{Domain, DomainContext};

/// Arguments for the `create` command.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Path to the libvirt domain XML.
    pub descriptor: PathBuf,
}

/// Executes the `create` command.
///
/// Live domains are recovered first so a UUID created by an earlier
/// invocation is rejected as a duplicate.
///
/// # Errors
///
/// Returns an error if the descriptor cannot be read or the domain fails
/// to start.
pub fn execute(args: CreateArgs, ctx: &DomainContext) -> anyhow::Result<()> {
    let xml = std::fs::read_to_string(&args.descriptor)
        .with_context(|| format!("reading {}", args.descriptor.display()))?;
    let _ = recover_all(ctx)?;
    let domain = Domain::create(xml, ctx)?;
    println!("{}", domain.uuid_string());
    Ok(())
}
