use std::fmt;

use chrono::{DateTime, Utc};
use dropwatch_core_types::{FusionResult, SessionId};
use serde::Serialize;

/// Where a poll loop currently is in its cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    #[default]
    Idle,
    Fetching,
    Evaluating,
    Found,
    Alerting,
    NotFound,
    Waiting,
    Terminating,
}

impl LoopPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Evaluating => "evaluating",
            Self::Found => "found",
            Self::Alerting => "alerting",
            Self::NotFound => "not_found",
            Self::Waiting => "waiting",
            Self::Terminating => "terminating",
        }
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of one loop. Published on every phase change.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PollState {
    pub phase: LoopPhase,
    /// Cycles started so far, including failed ones.
    pub attempts: u64,
    pub last_result: Option<FusionResult>,
    /// Id of the session currently held; the loop owns the handle itself.
    pub session: Option<SessionId>,
    pub last_success: Option<DateTime<Utc>>,
    pub alerts_delivered: u64,
    pub reacquisitions: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    Found,
    MaxAttempts,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cancelled => "cancelled",
            Self::Found => "found",
            Self::MaxAttempts => "max attempts reached",
        })
    }
}

/// How a loop ended, when it ended without a fatal error.
#[derive(Clone, Debug, Serialize)]
pub struct LoopOutcome {
    pub reason: StopReason,
    pub attempts: u64,
    /// Alerts that reached the notifier successfully.
    pub alerts: u64,
    pub last_result: Option<FusionResult>,
}
