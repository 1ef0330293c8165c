use std::fmt;
use std::time::Duration;

use dropwatch_notifier::RetryPolicy;
use dropwatch_page_fetcher::{AcquireOptions, MarkerWait};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Pause between cycles. A range avoids a detectable fixed cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitInterval {
    Fixed(Duration),
    Range { min: Duration, max: Duration },
}

impl Default for WaitInterval {
    fn default() -> Self {
        Self::Range {
            min: Duration::from_secs(2),
            max: Duration::from_secs(5),
        }
    }
}

impl WaitInterval {
    pub fn sample(&self) -> Duration {
        self.sample_with(&mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            Self::Fixed(duration) => duration,
            Self::Range { min, max } if max > min => rng.gen_range(min..=max),
            Self::Range { min, .. } => min,
        }
    }

    /// Longest pause this interval can produce.
    pub fn ceiling(&self) -> Duration {
        match *self {
            Self::Fixed(duration) => duration,
            Self::Range { min, max } => min.max(max),
        }
    }
}

impl fmt::Display for WaitInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(duration) => write!(f, "{duration:?}"),
            Self::Range { min, max } => write!(f, "{min:?}..{max:?}"),
        }
    }
}

/// What the loop does after a positive decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContinuationMode {
    StopOnFind,
    #[default]
    KeepMonitoring,
}

#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Bound on a single fetch, separate from the wait between cycles.
    pub fetch_timeout: Duration,
    /// Awaited once after acquisition and by the fetcher after each reload.
    pub marker: Option<MarkerWait>,
    pub wait: WaitInterval,
    pub max_attempts: Option<u64>,
    pub continuation: ContinuationMode,
    /// While still found, re-alert once this much time has passed since the
    /// last delivered alert. `None` alerts only on a new transition.
    pub realert_cooldown: Option<Duration>,
    pub notify_retry: RetryPolicy,
    /// Headers and user agent for the session. Timeout, marker and
    /// cancellation are filled in by the loop.
    pub acquire: AcquireOptions,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            marker: None,
            wait: WaitInterval::default(),
            max_attempts: None,
            continuation: ContinuationMode::default(),
            realert_cooldown: None,
            notify_retry: RetryPolicy::default(),
            acquire: AcquireOptions::default(),
        }
    }
}
