use std::path::{Path, PathBuf};

use crate::cli::output::OutputFormat;
use crate::config::WatchConfig;

pub struct CliContext {
    config: WatchConfig,
    config_path: Option<PathBuf>,
    metrics_port: u16,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(
        config: WatchConfig,
        config_path: Option<PathBuf>,
        metrics_port: u16,
        output: OutputFormat,
    ) -> Self {
        Self {
            config,
            config_path,
            metrics_port,
            output,
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// The file the config came from, if one was found.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn metrics_port(&self) -> u16 {
        self.metrics_port
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }
}
