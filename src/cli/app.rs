use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};

pub async fn run() -> Result<()> {
    let env_file = load_local_env_overrides();
    let cli = CliArgs::parse();

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    let _log_guard = init_logging(
        &cli.log_level,
        cli.debug,
        cli.log_format,
        config.logging.dir.as_deref(),
    )?;

    info!("Starting dropwatch v{}", env!("CARGO_PKG_VERSION"));
    if let Some(env_file) = env_file {
        info!(path = %env_file.display(), "Loaded environment overrides from local.env");
    }
    match &path {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => warn!("Config file not found, using defaults"),
    }

    let cli_context = CliContext::new(config, path, cli.metrics_port, cli.output);
    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
