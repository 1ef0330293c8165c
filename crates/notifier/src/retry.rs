use std::time::Duration;

use dropwatch_core_types::{AlertRecord, DeliveryOutcome};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::notifier::Notifier;

/// Bounded exponential backoff for alert delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total sends, including the first. Zero behaves as one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2,
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the `attempt`-th failed send (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Sends `record`, retrying retryable failures. Gives up early on
/// cancellation. Never returns an error: the outcome says what happened.
pub async fn deliver(
    notifier: &dyn Notifier,
    record: &AlertRecord,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> DeliveryOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match notifier.send(record).await {
            Ok(()) => {
                info!(
                    target: "notifier",
                    notifier = notifier.name(),
                    key = %record.dedup_key,
                    attempt,
                    "alert delivered"
                );
                return DeliveryOutcome::Delivered { attempts: attempt };
            }
            Err(err) => err,
        };

        warn!(
            target: "notifier",
            notifier = notifier.name(),
            key = %record.dedup_key,
            attempt,
            error = %err,
            "alert delivery failed"
        );
        if attempt >= max_attempts || !err.is_retryable() {
            return DeliveryOutcome::Failed {
                attempts: attempt,
                last_error: err.to_string(),
            };
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return DeliveryOutcome::Failed {
                    attempts: attempt,
                    last_error: format!("{err} (retry abandoned: shutting down)"),
                };
            }
            _ = sleep(policy.backoff_for(attempt)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use dropwatch_core_types::{TargetId, VerdictDetails};

    use crate::errors::NotifyError;

    struct Flaky {
        failures: AtomicU32,
        error: NotifyError,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, error: NotifyError) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                error,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Notifier for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn send(&self, _record: &AlertRecord) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left == 0 {
                return Ok(());
            }
            self.failures.store(left - 1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    fn record() -> AlertRecord {
        AlertRecord::new(
            TargetId::new("arena"),
            "https://example.com/e/1",
            VerdictDetails::default(),
            Utc::now(),
        )
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            multiplier: 3,
            max_backoff: Duration::from_secs(4),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1500));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(40), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_delivered() {
        let notifier = Flaky::new(2, NotifyError::Transport("reset".into()));
        let outcome = deliver(
            &notifier,
            &record(),
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let notifier = Flaky::new(10, NotifyError::Rejected { status: 503 });
        let outcome = deliver(
            &notifier,
            &record(),
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(outcome, DeliveryOutcome::Failed { attempts: 3, .. }));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let notifier = Flaky::new(10, NotifyError::Rejected { status: 401 });
        let outcome = deliver(
            &notifier,
            &record(),
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(outcome, DeliveryOutcome::Failed { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_backoff() {
        let notifier = Flaky::new(10, NotifyError::Transport("down".into()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = deliver(&notifier, &record(), &RetryPolicy::default(), &cancel).await;
        match outcome {
            DeliveryOutcome::Failed { attempts, last_error } => {
                assert_eq!(attempts, 1);
                assert!(last_error.contains("shutting down"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
