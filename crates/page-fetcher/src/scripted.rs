//! Deterministic fetcher that replays a script of outcomes and records every
//! call made against it.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dropwatch_core_types::{PageSnapshot, SessionId, Target};
use parking_lot::Mutex;
use tokio::time::sleep;

use crate::errors::FetchError;
use crate::fetcher::Fetcher;
use crate::session::{AcquireOptions, SessionHandle};

/// A call observed by the scripted fetcher, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchCall {
    Acquire,
    Fetch(SessionId),
    AwaitMarker(SessionId),
    Close(SessionId),
}

#[derive(Default)]
struct ScriptState {
    acquire_results: VecDeque<Result<(), FetchError>>,
    fetch_results: VecDeque<Result<String, FetchError>>,
    fallback_markup: String,
    marker_present: bool,
    live: HashSet<SessionId>,
    calls: Vec<FetchCall>,
}

#[derive(Clone)]
pub struct ScriptedFetcher {
    state: Arc<Mutex<ScriptState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    fetch_delay: Duration,
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedFetcher {
    /// Once the script runs out every fetch returns an empty page.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                fallback_markup: "<html><body></body></html>".into(),
                marker_present: true,
                ..ScriptState::default()
            })),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            fetch_delay: Duration::ZERO,
        }
    }

    /// Every fetch takes this long (virtual time under a paused runtime).
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_fallback(self, markup: impl Into<String>) -> Self {
        self.state.lock().fallback_markup = markup.into();
        self
    }

    pub fn with_marker_present(self, present: bool) -> Self {
        self.state.lock().marker_present = present;
        self
    }

    pub fn push_page(&self, markup: impl Into<String>) -> &Self {
        self.state.lock().fetch_results.push_back(Ok(markup.into()));
        self
    }

    pub fn push_error(&self, error: FetchError) -> &Self {
        self.state.lock().fetch_results.push_back(Err(error));
        self
    }

    pub fn push_acquire_ok(&self) -> &Self {
        self.state.lock().acquire_results.push_back(Ok(()));
        self
    }

    /// Queues the outcome of the next `acquire`. Unscripted acquisitions succeed.
    pub fn push_acquire_error(&self, error: FetchError) -> &Self {
        self.state.lock().acquire_results.push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&FetchCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| matches(call)).count()
    }

    pub fn acquisitions(&self) -> usize {
        self.count(|call| matches!(call, FetchCall::Acquire))
    }

    pub fn fetches(&self) -> usize {
        self.count(|call| matches!(call, FetchCall::Fetch(_)))
    }

    pub fn closes(&self) -> usize {
        self.count(|call| matches!(call, FetchCall::Close(_)))
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Highest number of fetches that were ever running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn acquire(
        &self,
        target: &Target,
        _options: &AcquireOptions,
    ) -> Result<SessionHandle, FetchError> {
        let mut state = self.state.lock();
        state.calls.push(FetchCall::Acquire);
        if let Some(Err(err)) = state.acquire_results.pop_front() {
            return Err(err);
        }
        let handle = SessionHandle::new(target.clone());
        state.live.insert(handle.id.clone());
        Ok(handle)
    }

    async fn fetch(&self, session: &SessionHandle) -> Result<PageSnapshot, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = {
            let mut state = self.state.lock();
            state.calls.push(FetchCall::Fetch(session.id.clone()));
            if !state.live.contains(&session.id) {
                Err(FetchError::SessionLost(format!("session {} is gone", session.id)))
            } else {
                let next = state.fetch_results.pop_front();
                let outcome = next.unwrap_or_else(|| Ok(state.fallback_markup.clone()));
                if matches!(outcome, Err(FetchError::SessionLost(_))) {
                    state.live.remove(&session.id);
                }
                outcome
            }
        };

        if !self.fetch_delay.is_zero() {
            sleep(self.fetch_delay).await;
        }
        outcome.map(|markup| PageSnapshot::captured_now(markup, session.target.url.clone()))
    }

    async fn await_marker(
        &self,
        session: &SessionHandle,
        _marker: &str,
        _timeout: Duration,
    ) -> Result<bool, FetchError> {
        let mut state = self.state.lock();
        state.calls.push(FetchCall::AwaitMarker(session.id.clone()));
        if !state.live.contains(&session.id) {
            return Err(FetchError::SessionLost(format!("session {} is gone", session.id)));
        }
        Ok(state.marker_present)
    }

    async fn close(&self, session: SessionHandle) {
        let mut state = self.state.lock();
        state.calls.push(FetchCall::Close(session.id.clone()));
        state.live.remove(&session.id);
    }
}
