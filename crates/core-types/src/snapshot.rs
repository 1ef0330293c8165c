use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One rendered copy of the target at a point in time.
///
/// Produced once per fetch and never mutated; fields are private so a layer
/// cannot alter what the next layer sees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    markup: String,
    fetched_at: DateTime<Utc>,
    source: String,
}

impl PageSnapshot {
    pub fn new(markup: impl Into<String>, fetched_at: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            fetched_at,
            source: source.into(),
        }
    }

    /// Snapshot stamped with the current wall clock.
    pub fn captured_now(markup: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(markup, Utc::now(), source)
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.markup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markup.trim().is_empty()
    }
}
