use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use dropwatch_core_types::{SessionId, Target};
use tokio_util::sync::CancellationToken;

/// Selector awaited after each reload before the page is captured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerWait {
    pub selector: String,
    pub timeout: Duration,
}

impl MarkerWait {
    pub fn new(selector: impl Into<String>, timeout: Duration) -> Self {
        Self {
            selector: selector.into(),
            timeout,
        }
    }
}

/// Per-session settings fixed at acquisition time.
#[derive(Clone, Debug)]
pub struct AcquireOptions {
    /// Bound on acquisition and on every fetch made through the session.
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
    pub user_agent: Option<String>,
    pub marker: Option<MarkerWait>,
    /// Aborts an in-progress launch or marker wait. A running fetch ignores it.
    pub cancel: CancellationToken,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            headers: BTreeMap::new(),
            user_agent: None,
            marker: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl AcquireOptions {
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_marker(mut self, marker: Option<MarkerWait>) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Key for a live session. The fetcher owns the browser behind it; holders of
/// a handle can only ask the fetcher to use or close it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: SessionId,
    pub target: Target,
}

impl SessionHandle {
    pub fn new(target: Target) -> Self {
        Self {
            id: SessionId::new(),
            target,
        }
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.target.id)
    }
}
