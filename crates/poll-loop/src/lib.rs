//! The polling engine: one [`PollLoop`] per watched target, each holding a
//! single browser session and repeating fetch, evaluate, alert and wait
//! until cancelled, found (in stop-on-find mode) or out of attempts.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod poll_loop;
pub mod state;

pub use config::{ContinuationMode, PollConfig, WaitInterval};
pub use errors::WatchError;
pub use metrics::register_metrics;
pub use poll_loop::{evaluate, Collaborators, PollLoop};
pub use state::{LoopOutcome, LoopPhase, PollState, StopReason};
