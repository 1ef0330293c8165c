use dropwatch_core_types::DropwatchError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("notification rejected with status {status}")]
    Rejected { status: u16 },
    #[error("notifier misconfigured: {0}")]
    Config(String),
}

impl NotifyError {
    /// Transport hiccups, throttling and server errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status } => *status == 429 || *status >= 500,
            Self::Config(_) => false,
        }
    }
}

impl From<NotifyError> for DropwatchError {
    fn from(value: NotifyError) -> Self {
        DropwatchError::new(value.to_string())
    }
}
