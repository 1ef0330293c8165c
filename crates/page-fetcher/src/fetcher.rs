use std::time::Duration;

use async_trait::async_trait;
use dropwatch_core_types::{PageSnapshot, Target};

use crate::errors::FetchError;
use crate::session::{AcquireOptions, SessionHandle};

/// Produces rendered snapshots of a target through a long-lived session.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Opens a session on `target`. Failing here means no session can be had.
    async fn acquire(
        &self,
        target: &Target,
        options: &AcquireOptions,
    ) -> Result<SessionHandle, FetchError>;

    /// Refreshes the page and captures its markup, bounded by the session timeout.
    async fn fetch(&self, session: &SessionHandle) -> Result<PageSnapshot, FetchError>;

    /// Waits up to `timeout` for `marker` to be present in the current page.
    async fn await_marker(
        &self,
        session: &SessionHandle,
        marker: &str,
        timeout: Duration,
    ) -> Result<bool, FetchError>;

    /// Releases the session. Never fails; problems are logged.
    async fn close(&self, session: SessionHandle);
}
