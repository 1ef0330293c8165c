use dropwatch_fusion_policy::PolicyError;
use dropwatch_signal_layers::LayerError;
use thiserror::Error;

/// Problems found in a configuration before anything is started.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no targets configured; add `targets` to the config or pass --target")]
    NoTargets,
    #[error("target id `{0}` must be non-empty and use only letters, digits, '-', '_' or '.'")]
    InvalidTargetId(String),
    #[error("duplicate target id `{0}`")]
    DuplicateTarget(String),
    #[error("target `{id}` has an invalid url: {reason}")]
    InvalidTargetUrl { id: String, reason: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("wait interval is invalid: {0}")]
    InvalidWait(String),
    #[error("webhook notifier needs notifier.webhook_url or DROPWATCH_WEBHOOK_URL")]
    MissingWebhookUrl,
    #[error("fusion policy rejected: {0}")]
    Policy(#[from] PolicyError),
    #[error("layer configuration rejected: {0}")]
    Layers(#[from] LayerError),
}

/// Failures of the `discover` command.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("TM_API_KEY is not set")]
    MissingApiKey,
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write csv: {0}")]
    Io(#[from] std::io::Error),
}
