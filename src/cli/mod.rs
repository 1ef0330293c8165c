mod app;
mod check;
mod commands;
mod context;
mod discover;
mod dispatch;
mod env;
mod layers;
mod output;
mod runtime;
mod watch;

pub use app::run;
pub use context::CliContext;
pub use output::OutputFormat;
pub use runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig, LogFormat};
