use super::check::cmd_check;
use super::discover::cmd_discover;
use super::env::CliArgs;
use super::layers::cmd_layers;
use super::watch::cmd_watch;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Watch(args) => cmd_watch(args, ctx).await,
        Commands::Check(args) => cmd_check(args, ctx).await,
        Commands::Layers => cmd_layers(ctx),
        Commands::Discover(args) => cmd_discover(args).await,
    }
}
