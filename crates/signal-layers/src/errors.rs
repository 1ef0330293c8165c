//! Error types for signal layers

use dropwatch_core_types::DropwatchError;
use thiserror::Error;

/// Failure inside one layer. Never escapes `evaluate`: it becomes an
/// `Error` verdict carrying this message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayerError {
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("malformed structured data: {0}")]
    Payload(String),

    #[error("layer panicked: {0}")]
    Panicked(String),

    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    #[error("duplicate layer: {0}")]
    DuplicateLayer(String),
}

impl From<LayerError> for DropwatchError {
    fn from(value: LayerError) -> Self {
        DropwatchError::new(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LayerError>;
