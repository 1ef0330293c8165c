use std::time::Duration;

use dropwatch_core_types::DropwatchError;
use thiserror::Error;

/// Failures a fetcher surfaces to the poll loop. Session loss is kept distinct
/// so the caller can reacquire instead of retrying on a dead handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("session lost: {0}")]
    SessionLost(String),
    #[error("marker `{0}` did not appear")]
    MarkerNotFound(String),
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Self::SessionLost(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::SessionLost(_) => "session_lost",
            Self::MarkerNotFound(_) => "marker_not_found",
            Self::Launch(_) => "launch",
            Self::Protocol(_) => "protocol",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<FetchError> for DropwatchError {
    fn from(value: FetchError) -> Self {
        DropwatchError::new(value.to_string())
    }
}
