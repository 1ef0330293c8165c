use dropwatch_core_types::DropwatchError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("fusion rule references unknown layer: {0}")]
    UnknownLayer(String),
    #[error("conjunctive rule needs at least one layer")]
    EmptyConjunction,
    #[error("invalid fusion rule: {0}")]
    Invalid(String),
}

impl From<PolicyError> for DropwatchError {
    fn from(value: PolicyError) -> Self {
        DropwatchError::new(value.to_string())
    }
}
