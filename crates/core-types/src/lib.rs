//! Shared primitives for the dropwatch monitor.
//!
//! Everything that crosses a crate boundary lives here: identifiers, the page
//! snapshot a fetch produces, the verdict a signal layer emits, the fused
//! decision and the alert record handed to a notifier.

mod alert;
mod ids;
mod snapshot;
mod verdict;

use thiserror::Error;

pub use alert::{AlertRecord, DeliveryOutcome};
pub use ids::{LayerId, SessionId, Target, TargetId};
pub use snapshot::PageSnapshot;
pub use verdict::{
    Classification, EventMetadata, FusionResult, LayerRole, LayerVerdict, OfferDetail,
    VerdictDetails,
};

/// Crate-agnostic error message; every component error converts into it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DropwatchError {
    #[error("{message}")]
    Message { message: String },
}

impl DropwatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}
