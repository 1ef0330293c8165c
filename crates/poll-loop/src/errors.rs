use dropwatch_core_types::DropwatchError;
use dropwatch_page_fetcher::FetchError;
use thiserror::Error;

/// Everything that can go wrong inside a poll loop. Only `FatalStartup`
/// leaves the loop; the rest are recorded and the loop moves on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("fetch timed out: {0}")]
    FetchTimeout(String),
    #[error("session lost: {0}")]
    SessionLost(String),
    #[error("marker not found: {0}")]
    MarkerNotFound(String),
    #[error("fetch failed: {0}")]
    FetchFailed(String),
    #[error("layer {layer} failed: {message}")]
    LayerEvaluation { layer: String, message: String },
    #[error("no usable verdict under {0}")]
    FusionAmbiguous(String),
    #[error("notifier failed: {0}")]
    Notifier(String),
    #[error("fatal startup error: {0}")]
    FatalStartup(String),
}

impl WatchError {
    /// Taxonomy name recorded in the audit log and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FetchTimeout(_) => "FetchTimeout",
            Self::SessionLost(_) => "SessionLost",
            Self::MarkerNotFound(_) => "MarkerNotFound",
            Self::FetchFailed(_) => "FetchFailed",
            Self::LayerEvaluation { .. } => "LayerEvaluationError",
            Self::FusionAmbiguous(_) => "FusionAmbiguous",
            Self::Notifier(_) => "NotifierError",
            Self::FatalStartup(_) => "FatalStartupError",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalStartup(_))
    }

    /// An acquisition failure: no session could be produced at all.
    pub fn startup(err: FetchError) -> Self {
        Self::FatalStartup(err.to_string())
    }
}

/// Failures of an individual fetch. Acquisition failures go through
/// [`WatchError::startup`] instead.
impl From<FetchError> for WatchError {
    fn from(value: FetchError) -> Self {
        let message = value.to_string();
        match value {
            FetchError::Timeout(_) => Self::FetchTimeout(message),
            FetchError::SessionLost(_) => Self::SessionLost(message),
            FetchError::MarkerNotFound(_) => Self::MarkerNotFound(message),
            FetchError::Launch(_) | FetchError::Protocol(_) | FetchError::Cancelled => {
                Self::FetchFailed(message)
            }
        }
    }
}

impl From<WatchError> for DropwatchError {
    fn from(value: WatchError) -> Self {
        DropwatchError::new(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fetch_errors_map_onto_taxonomy() {
        let err = WatchError::from(FetchError::Timeout(Duration::from_secs(30)));
        assert_eq!(err.kind(), "FetchTimeout");
        assert!(!err.is_fatal());
        assert_eq!(
            WatchError::from(FetchError::SessionLost("detached".into())).kind(),
            "SessionLost"
        );
    }

    #[test]
    fn launch_is_fatal_only_when_acquiring() {
        let during_fetch = WatchError::from(FetchError::Launch("browser gone".into()));
        assert_eq!(during_fetch.kind(), "FetchFailed");
        assert!(!during_fetch.is_fatal());

        let during_acquire = WatchError::startup(FetchError::Launch("no chrome".into()));
        assert_eq!(during_acquire.kind(), "FatalStartupError");
        assert!(during_acquire.is_fatal());
    }
}
