//! CLI command definitions and dispatch.

pub mod check;
pub mod create;
pub mod destroy;
pub mod list;
pub mod recover;
pub mod reset;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use convirt_common::config::ConvirtConfig;
use convirt_common::types::VmId;
use convirt_domain::recovery::recover_all;
use convirt_domain::{Domain, DomainContext};
use convirt_runtime::command::Repo;

/// convirtctl: containers as virtual machine domains, supervised by systemd.
#[derive(Parser, Debug)]
#[command(name = "convirtctl", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// JSON configuration file.
    #[arg(long, global = true, env = "CONVIRT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding runtime state and saved descriptors.
    #[arg(long, global = true)]
    pub run_dir: Option<PathBuf>,

    /// Prefix systemd commands with sudo.
    #[arg(long, global = true)]
    pub sudo: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start a domain from a descriptor file.
    Create(create::CreateArgs),
    /// List the domains backed by live units.
    List(list::ListArgs),
    /// Recover every live unit with a saved descriptor.
    Recover,
    /// Show the runtime status of a domain.
    Status(status::StatusArgs),
    /// Stop and restart the unit of a domain.
    Reset(reset::ResetArgs),
    /// Stop a domain and release its resources.
    Destroy(destroy::DestroyArgs),
    /// Report which container engines are installed.
    Check,
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the command fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let ctx = context(&cli.global)?;
    match cli.command {
        Command::Create(args) => create::execute(args, &ctx),
        Command::List(args) => list::execute(&args, &ctx),
        Command::Recover => recover::execute(&ctx),
        Command::Status(args) => status::execute(&args, &ctx),
        Command::Reset(args) => reset::execute(&args, &ctx),
        Command::Destroy(args) => destroy::execute(&args, &ctx),
        Command::Check => check::execute(&ctx),
    }
}

/// Builds the domain context from the config file, the environment, and
/// the command-line flags, in increasing order of precedence.
fn context(global: &GlobalArgs) -> anyhow::Result<DomainContext> {
    context_with_env(global, |key| std::env::var(key).ok())
}

fn context_with_env(
    global: &GlobalArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<DomainContext> {
    let config = match &global.config {
        Some(path) => ConvirtConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ConvirtConfig::default(),
    };
    let mut config = config.apply_env_from(lookup)?;
    if let Some(run_dir) = &global.run_dir {
        config.run_dir.clone_from(run_dir);
    }
    if global.sudo {
        config.use_sudo = true;
    }
    tracing::debug!(?config, "configuration resolved");
    Ok(DomainContext::new(config, Repo::system()))
}

/// Recovers the live domains, then returns the one with `uuid`.
///
/// Every invocation starts with an empty registry, so domains created by
/// earlier invocations are only reachable through recovery.
fn lookup(ctx: &DomainContext, uuid: &str) -> anyhow::Result<Arc<Domain>> {
    let vm_id: VmId = uuid.parse()?;
    let _ = recover_all(ctx)?;
    ctx.registry
        .get(&vm_id)?
        .with_context(|| format!("no live domain with uuid {vm_id}"))
}
