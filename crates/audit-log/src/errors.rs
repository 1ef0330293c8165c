use std::io;

use dropwatch_core_types::DropwatchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit io error: {0}")]
    Io(#[from] io::Error),
    #[error("audit encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<AuditError> for DropwatchError {
    fn from(value: AuditError) -> Self {
        DropwatchError::new(value.to_string())
    }
}
