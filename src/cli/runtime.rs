use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use tokio::fs;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::WatchConfig;

const LOCAL_ENV: &str = "config/local.env";
const LOCAL_CONFIG: &str = "config/dropwatch.yaml";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Human,
    Json,
}

/// Exports `KEY=value` lines from `config/local.env` unless the variable is
/// already set. Returns the file path when one was read.
pub fn load_local_env_overrides() -> Option<PathBuf> {
    let path = Path::new(LOCAL_ENV);
    if !path.exists() {
        return None;
    }

    match stdfs::read_to_string(path) {
        Ok(contents) => {
            for (key, value) in parse_env_lines(&contents) {
                if env::var(&key).is_err() {
                    env::set_var(key, value);
                }
            }
            Some(path.to_path_buf())
        }
        Err(err) => {
            warn!(path = %path.display(), ?err, "failed to read local.env overrides");
            None
        }
    }
}

fn parse_env_lines(contents: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            warn!(line = idx + 1, "invalid local.env entry; skipping");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        pairs.push((key.to_string(), unescape_value(value.trim())));
    }
    pairs
}

/// Installs the global subscriber. The returned guard flushes the log file
/// on drop and must outlive the command.
pub fn init_logging(
    level: &str,
    debug: bool,
    format: LogFormat,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let filter = if debug {
        EnvFilter::new(tracing::Level::DEBUG.to_string())
    } else {
        let level: tracing::Level = level.parse().context("Invalid log level")?;
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            stdfs::create_dir_all(dir)
                .with_context(|| format!("failed to create log dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "dropwatch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    let human = (format == LogFormat::Human).then(|| fmt::layer().with_writer(std::io::stderr));
    let json =
        (format == LogFormat::Json).then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(human)
        .with(json)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

pub struct LoadedConfig {
    pub config: WatchConfig,
    /// `None` when no file was found and defaults are in use.
    pub path: Option<PathBuf>,
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = match config_path {
        Some(path) if !path.exists() => bail!("config file {} does not exist", path.display()),
        Some(path) => Some(path.clone()),
        None => default_config_path(),
    };

    let mut config = match &path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            WatchConfig::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        }
        None => WatchConfig::default(),
    };
    config.apply_env_overrides();
    Ok(LoadedConfig { config, path })
}

/// `./config/dropwatch.yaml`, else `~/.config/dropwatch/config.yaml`.
fn default_config_path() -> Option<PathBuf> {
    let local_config = PathBuf::from(LOCAL_CONFIG);
    if local_config.exists() {
        return Some(local_config);
    }
    let mut path = dirs::config_dir()?;
    path.push("dropwatch");
    path.push("config.yaml");
    path.exists().then_some(path)
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else {
        value.to_string()
    }
}
