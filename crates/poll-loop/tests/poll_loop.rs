use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dropwatch_audit_log::{AuditEntry, MemoryAuditLog};
use dropwatch_core_types::{AlertRecord, DeliveryOutcome, Target};
use dropwatch_fusion_policy::{FusionPolicy, FusionRule};
use dropwatch_notifier::{Notifier, NotifyError, RetryPolicy};
use dropwatch_page_fetcher::{FetchCall, FetchError, MarkerWait, ScriptedFetcher, DEFAULT_MARKER};
use dropwatch_poll_loop::{
    Collaborators, ContinuationMode, LoopPhase, PollConfig, PollLoop, StopReason, WaitInterval,
};
use dropwatch_signal_layers::LayerRegistry;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const SOLD_OUT: &str = include_str!("../../signal-layers/tests/fixtures/sold_out.html");
const METADATA_ONLY: &str = include_str!("../../signal-layers/tests/fixtures/metadata_only.html");

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<AlertRecord>>>,
    fail_with: Option<NotifyError>,
}

impl RecordingNotifier {
    fn failing(error: NotifyError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<AlertRecord> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, record: &AlertRecord) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(record.clone());
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

struct Harness {
    fetcher: ScriptedFetcher,
    notifier: RecordingNotifier,
    audit: MemoryAuditLog,
    cancel: CancellationToken,
}

impl Harness {
    fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self {
            fetcher: ScriptedFetcher::new().with_fallback(SOLD_OUT),
            notifier,
            audit: MemoryAuditLog::new(),
            cancel: CancellationToken::new(),
        }
    }

    fn build(&self, rule: FusionRule, config: PollConfig) -> PollLoop {
        PollLoop::new(
            Target::new("arena", "https://www.ticketmaster.co.uk/event/1F00"),
            config,
            LayerRegistry::standard(),
            FusionPolicy::new(rule),
            Collaborators {
                fetcher: Arc::new(self.fetcher.clone()),
                notifier: Arc::new(self.notifier.clone()),
                audit: Arc::new(self.audit.clone()),
                archive: None,
            },
            self.cancel.clone(),
        )
    }

    fn recoverable_kinds(&self) -> Vec<String> {
        self.audit
            .records()
            .into_iter()
            .filter_map(|record| match record.entry {
                AuditEntry::Recoverable { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    fn fatal_kinds(&self) -> Vec<String> {
        self.audit
            .records()
            .into_iter()
            .filter_map(|record| match record.entry {
                AuditEntry::Fatal { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    fn evaluations(&self) -> usize {
        self.audit
            .records()
            .iter()
            .filter(|record| matches!(record.entry, AuditEntry::Evaluated { .. }))
            .count()
    }
}

fn config(max_attempts: u64) -> PollConfig {
    PollConfig {
        wait: WaitInterval::Fixed(Duration::from_secs(3)),
        max_attempts: Some(max_attempts),
        notify_retry: RetryPolicy::no_retry(),
        ..PollConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_keeps_session_and_loop_running() {
    let harness = Harness::new();
    harness
        .fetcher
        .push_error(FetchError::Timeout(Duration::from_secs(30)));

    let outcome = harness
        .build(FusionRule::default(), config(3))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.reason, StopReason::MaxAttempts);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(harness.fetcher.acquisitions(), 1);
    assert_eq!(harness.fetcher.fetches(), 3);
    assert_eq!(harness.fetcher.closes(), 1);
    assert_eq!(harness.recoverable_kinds(), vec!["FetchTimeout".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_is_bounded_by_fetch_timeout() {
    let mut harness = Harness::new();
    harness.fetcher = ScriptedFetcher::new()
        .with_fallback(SOLD_OUT)
        .with_fetch_delay(Duration::from_secs(90));
    let cfg = PollConfig {
        fetch_timeout: Duration::from_secs(10),
        ..config(2)
    };

    let started = Instant::now();
    let outcome = harness.build(FusionRule::default(), cfg).run().await.unwrap();

    assert_eq!(outcome.attempts, 2);
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(harness.recoverable_kinds().len(), 2);
    assert_eq!(harness.fetcher.acquisitions(), 1);
}

#[tokio::test(start_paused = true)]
async fn lost_session_is_replaced_once_before_next_fetch() {
    let harness = Harness::new();
    harness
        .fetcher
        .push_error(FetchError::SessionLost("target detached".into()));

    let outcome = harness
        .build(FusionRule::default(), config(3))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.attempts, 3);

    let calls = harness.fetcher.calls();
    let first = match &calls[1] {
        FetchCall::Fetch(id) => id.clone(),
        other => panic!("unexpected call {other:?}"),
    };
    let second = match &calls[4] {
        FetchCall::Fetch(id) => id.clone(),
        other => panic!("unexpected call {other:?}"),
    };
    assert_ne!(first, second);
    assert_eq!(
        calls,
        vec![
            FetchCall::Acquire,
            FetchCall::Fetch(first.clone()),
            FetchCall::Close(first),
            FetchCall::Acquire,
            FetchCall::Fetch(second.clone()),
            FetchCall::Fetch(second.clone()),
            FetchCall::Close(second),
        ]
    );
    assert_eq!(harness.fetcher.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn fetches_never_overlap() {
    let mut harness = Harness::new();
    harness.fetcher = ScriptedFetcher::new()
        .with_fallback(SOLD_OUT)
        .with_fetch_delay(Duration::from_secs(5));

    harness
        .build(FusionRule::default(), config(4))
        .run()
        .await
        .unwrap();

    assert_eq!(harness.fetcher.fetches(), 4);
    assert_eq!(harness.fetcher.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_wait() {
    let harness = Harness::new();
    let cfg = PollConfig {
        wait: WaitInterval::Fixed(Duration::from_secs(60)),
        max_attempts: None,
        ..config(1)
    };
    let watcher = harness.build(FusionRule::default(), cfg);
    let status = watcher.subscribe();

    let started = Instant::now();
    let task = tokio::spawn(watcher.run());
    tokio::time::sleep(Duration::from_secs(1)).await;
    harness.cancel.cancel();
    let outcome = task.await.unwrap().unwrap();

    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert_eq!(outcome.attempts, 1);
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(harness.fetcher.open_sessions(), 0);
    assert_eq!(status.borrow().phase, LoopPhase::Terminating);
}

#[tokio::test(start_paused = true)]
async fn cancellation_lets_the_inflight_fetch_finish() {
    let mut harness = Harness::new();
    harness.fetcher = ScriptedFetcher::new()
        .with_fallback(SOLD_OUT)
        .with_fetch_delay(Duration::from_secs(5));
    let cfg = PollConfig {
        wait: WaitInterval::Fixed(Duration::from_secs(60)),
        max_attempts: None,
        ..config(1)
    };
    let watcher = harness.build(FusionRule::default(), cfg);

    let started = Instant::now();
    let task = tokio::spawn(watcher.run());
    tokio::time::sleep(Duration::from_secs(1)).await;
    harness.cancel.cancel();
    let outcome = task.await.unwrap().unwrap();

    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.last_result.is_some());
    assert_eq!(harness.evaluations(), 1);
    assert!(harness.recoverable_kinds().is_empty());
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(harness.fetcher.fetches(), 1);
    assert_eq!(harness.fetcher.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_never_acquires() {
    let harness = Harness::new();
    harness.cancel.cancel();
    let outcome = harness
        .build(FusionRule::default(), config(5))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert_eq!(outcome.attempts, 0);
    assert_eq!(harness.fetcher.acquisitions(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_on_find_alerts_with_offer_details() {
    let harness = Harness::new();
    harness.fetcher.push_page(SOLD_OUT).push_page(METADATA_ONLY);
    let cfg = PollConfig {
        continuation: ContinuationMode::StopOnFind,
        marker: Some(MarkerWait::new(DEFAULT_MARKER, Duration::from_secs(5))),
        ..config(10)
    };

    let outcome = harness.build(FusionRule::AnyPositive, cfg).run().await.unwrap();

    assert_eq!(outcome.reason, StopReason::Found);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.alerts, 1);
    assert!(outcome.last_result.unwrap().found);
    assert_eq!(
        harness
            .fetcher
            .count(|call| matches!(call, FetchCall::AwaitMarker(_))),
        1
    );

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].price_labels(), vec!["45.00 GBP".to_string()]);
    assert_eq!(sent[0].dedup_key.as_str(), "arena");
    assert_eq!(harness.fetcher.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn authoritative_rule_ignores_corroborating_positive() {
    let harness = Harness::new();
    harness.fetcher.push_page(METADATA_ONLY);

    let outcome = harness
        .build(FusionRule::default(), config(1))
        .run()
        .await
        .unwrap();

    assert!(!outcome.last_result.unwrap().found);
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn keep_monitoring_alerts_once_per_transition() {
    let harness = Harness::new();
    harness
        .fetcher
        .push_page(METADATA_ONLY)
        .push_page(METADATA_ONLY)
        .push_page(SOLD_OUT)
        .push_page(METADATA_ONLY);

    let outcome = harness
        .build(FusionRule::AnyPositive, config(4))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.reason, StopReason::MaxAttempts);
    assert_eq!(outcome.alerts, 2);
    assert_eq!(harness.notifier.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cooldown_allows_a_repeat_alert() {
    let harness = Harness::new();
    for _ in 0..3 {
        harness.fetcher.push_page(METADATA_ONLY);
    }
    let cfg = PollConfig {
        wait: WaitInterval::Fixed(Duration::from_secs(30)),
        realert_cooldown: Some(Duration::from_secs(45)),
        ..config(3)
    };

    let outcome = harness.build(FusionRule::AnyPositive, cfg).run().await.unwrap();
    assert_eq!(outcome.alerts, 2);
}

#[tokio::test(start_paused = true)]
async fn notifier_failure_does_not_stop_the_loop() {
    let harness =
        Harness::with_notifier(RecordingNotifier::failing(NotifyError::Rejected { status: 500 }));
    harness
        .fetcher
        .push_page(METADATA_ONLY)
        .push_page(METADATA_ONLY);

    let outcome = harness
        .build(FusionRule::AnyPositive, config(2))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.reason, StopReason::MaxAttempts);
    assert_eq!(outcome.alerts, 0);
    // an undelivered alert does not suppress the next one
    assert_eq!(harness.notifier.sent().len(), 2);
    assert_eq!(
        harness
            .recoverable_kinds()
            .iter()
            .filter(|kind| kind.as_str() == "NotifierError")
            .count(),
        2
    );
    let failed = harness
        .audit
        .records()
        .into_iter()
        .filter(|record| {
            matches!(
                &record.entry,
                AuditEntry::Alert { record } if matches!(record.delivery, DeliveryOutcome::Failed { .. })
            )
        })
        .count();
    assert_eq!(failed, 2);
}

#[tokio::test(start_paused = true)]
async fn failed_startup_is_fatal() {
    let harness = Harness::new();
    harness
        .fetcher
        .push_acquire_error(FetchError::Launch("no chrome".into()));

    let err = harness
        .build(FusionRule::default(), config(3))
        .run()
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(harness.fetcher.fetches(), 0);
    assert_eq!(harness.fetcher.closes(), 0);
    assert_eq!(harness.fatal_kinds(), vec!["FatalStartupError".to_string()]);
    assert!(harness.recoverable_kinds().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_reacquisition_is_fatal() {
    let harness = Harness::new();
    harness
        .fetcher
        .push_acquire_ok()
        .push_acquire_error(FetchError::Launch("profile locked".into()));
    harness
        .fetcher
        .push_error(FetchError::SessionLost("crashed".into()));

    let err = harness
        .build(FusionRule::default(), config(5))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "FatalStartupError");
    assert_eq!(harness.fetcher.acquisitions(), 2);
    assert_eq!(harness.fetcher.fetches(), 1);
    assert_eq!(harness.fetcher.open_sessions(), 0);
    assert_eq!(harness.recoverable_kinds(), vec!["SessionLost".to_string()]);
    assert_eq!(harness.fatal_kinds(), vec!["FatalStartupError".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn launch_error_while_fetching_is_recoverable() {
    let harness = Harness::new();
    harness
        .fetcher
        .push_error(FetchError::Launch("browser process exited".into()));

    let outcome = harness
        .build(FusionRule::default(), config(2))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.reason, StopReason::MaxAttempts);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(harness.recoverable_kinds(), vec!["FetchFailed".to_string()]);
    assert!(harness.fatal_kinds().is_empty());
    assert_eq!(harness.fetcher.acquisitions(), 1);
}

#[tokio::test(start_paused = true)]
async fn every_cycle_is_audited() {
    let harness = Harness::new();
    harness
        .build(FusionRule::default(), config(3))
        .run()
        .await
        .unwrap();

    let evaluated = harness
        .audit
        .records()
        .iter()
        .filter(|record| matches!(record.entry, AuditEntry::Evaluated { .. }))
        .count();
    assert_eq!(evaluated, 3);
    let attempts: Vec<u64> = harness
        .audit
        .records()
        .iter()
        .filter(|record| matches!(record.entry, AuditEntry::Evaluated { .. }))
        .map(|record| record.attempt)
        .collect();
    assert_eq!(attempts, vec![1, 2, 3]);
}
