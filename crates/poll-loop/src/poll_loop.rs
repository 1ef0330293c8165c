use std::sync::Arc;

use chrono::Utc;
use dropwatch_audit_log::{AuditEntry, AuditSink, CycleAudit, SnapshotArchive};
use dropwatch_core_types::{
    AlertRecord, Classification, DeliveryOutcome, FusionResult, PageSnapshot, Target,
};
use dropwatch_fusion_policy::FusionPolicy;
use dropwatch_notifier::{deliver, Notifier};
use dropwatch_page_fetcher::{FetchError, Fetcher, SessionHandle};
use dropwatch_signal_layers::LayerRegistry;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{ContinuationMode, PollConfig};
use crate::errors::WatchError;
use crate::metrics;
use crate::state::{LoopOutcome, LoopPhase, PollState, StopReason};

/// Runs every layer over a snapshot and fuses the verdicts.
pub fn evaluate(
    layers: &LayerRegistry,
    policy: &FusionPolicy,
    snapshot: &PageSnapshot,
) -> FusionResult {
    policy.decide(&layers.evaluate_all(snapshot))
}

/// The external pieces a loop drives.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub notifier: Arc<dyn Notifier>,
    pub audit: Arc<dyn AuditSink>,
    pub archive: Option<SnapshotArchive>,
}

/// Decides whether a positive cycle should produce an alert.
#[derive(Debug, Default)]
struct AlertGate {
    was_found: bool,
    last_delivered: Option<Instant>,
}

impl AlertGate {
    fn should_alert(&self, now: Instant, cooldown: Option<std::time::Duration>) -> bool {
        if !self.was_found {
            return true;
        }
        match (self.last_delivered, cooldown) {
            // the last attempt in this streak failed
            (None, _) => true,
            (Some(at), Some(cooldown)) => now.duration_since(at) >= cooldown,
            (Some(_), None) => false,
        }
    }

    fn found(&mut self, delivered_at: Option<Instant>) {
        self.was_found = true;
        if delivered_at.is_some() {
            self.last_delivered = delivered_at;
        }
    }

    fn cleared(&mut self) {
        self.was_found = false;
        self.last_delivered = None;
    }
}

enum CycleEnd {
    Continue,
    Stop(StopReason),
}

/// One target's fetch, evaluate and wait loop.
///
/// The loop owns at most one session at a time and runs at most one fetch
/// at a time. Every recoverable failure is logged, counted and audited, and
/// the loop moves on; only a failed (re)acquisition ends it with an error.
/// Cancellation is observed at the top of each cycle and during the wait.
pub struct PollLoop {
    target: Target,
    config: PollConfig,
    layers: LayerRegistry,
    policy: FusionPolicy,
    parts: Collaborators,
    cancel: CancellationToken,
    state: PollState,
    status: watch::Sender<PollState>,
    gate: AlertGate,
}

impl PollLoop {
    pub fn new(
        target: Target,
        config: PollConfig,
        layers: LayerRegistry,
        policy: FusionPolicy,
        parts: Collaborators,
        cancel: CancellationToken,
    ) -> Self {
        let (status, _) = watch::channel(PollState::default());
        Self {
            target,
            config,
            layers,
            policy,
            parts,
            cancel,
            state: PollState::default(),
            status,
            gate: AlertGate::default(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.status.subscribe()
    }

    pub async fn run(self) -> Result<LoopOutcome, WatchError> {
        let span = info_span!("poll", watch = %self.target.id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> Result<LoopOutcome, WatchError> {
        self.set_phase(LoopPhase::Idle);
        if self.cancel.is_cancelled() {
            return Ok(self.finish(StopReason::Cancelled));
        }

        self.lifecycle(format!("starting watch of {}", self.target.url));
        let mut session = match self.acquire().await {
            Ok(handle) => Some(handle),
            Err(FetchError::Cancelled) => return Ok(self.finish(StopReason::Cancelled)),
            Err(err) => return Err(self.fatal(err)),
        };
        if let Some(handle) = session.as_ref() {
            self.check_readiness(handle).await;
        }

        let result = self.cycles(&mut session).await;

        self.set_phase(LoopPhase::Terminating);
        if let Some(handle) = session.take() {
            self.parts.fetcher.close(handle).await;
        }
        self.state.session = None;
        self.publish();
        match &result {
            Ok(outcome) => self.lifecycle(format!(
                "stopped after {} attempts: {}",
                outcome.attempts, outcome.reason
            )),
            Err(err) => self.lifecycle(format!("stopped: {err}")),
        }
        result
    }

    async fn cycles(
        &mut self,
        session: &mut Option<SessionHandle>,
    ) -> Result<LoopOutcome, WatchError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.finish(StopReason::Cancelled));
            }

            if let CycleEnd::Stop(reason) = self.cycle(session).await? {
                return Ok(self.finish(reason));
            }

            if let Some(max) = self.config.max_attempts {
                if self.state.attempts >= max {
                    info!(target: "poll-loop", attempts = self.state.attempts, "attempt limit reached");
                    return Ok(self.finish(StopReason::MaxAttempts));
                }
            }

            self.set_phase(LoopPhase::Waiting);
            let pause = self.config.wait.sample();
            debug!(target: "poll-loop", pause_ms = pause.as_millis() as u64, "waiting before next cycle");
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Ok(self.finish(StopReason::Cancelled));
                }
                _ = sleep(pause) => {}
            }
            self.set_phase(LoopPhase::Idle);
        }
    }

    async fn cycle(&mut self, session: &mut Option<SessionHandle>) -> Result<CycleEnd, WatchError> {
        self.state.attempts += 1;
        self.set_phase(LoopPhase::Fetching);

        let handle = match session.as_ref() {
            Some(handle) => handle,
            None => {
                return Err(WatchError::FatalStartup(
                    "no session available for fetch".into(),
                ))
            }
        };

        let started = Instant::now();
        let fetched = match timeout(self.config.fetch_timeout, self.parts.fetcher.fetch(handle)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout(self.config.fetch_timeout)),
        };
        metrics::record_fetch(self.target.id.as_str(), started.elapsed());

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.fetch_failed(session, err).await?;
                return Ok(CycleEnd::Continue);
            }
        };
        self.state.last_success = Some(snapshot.fetched_at());

        self.set_phase(LoopPhase::Evaluating);
        let result = evaluate(&self.layers, &self.policy, &snapshot);
        self.audit(AuditEntry::Evaluated {
            result: result.clone(),
        });
        self.audit_layer_errors(&result);
        self.state.last_result = Some(result.clone());

        if !result.found {
            self.gate.cleared();
            self.set_phase(LoopPhase::NotFound);
            if result.ambiguous {
                let err = WatchError::FusionAmbiguous(result.rule.clone());
                debug!(target: "poll-loop", error = %err, "cycle inconclusive");
                self.recoverable(&err);
                metrics::record_cycle(self.target.id.as_str(), "ambiguous");
            } else {
                info!(target: "poll-loop", attempt = self.state.attempts, "{}", result.summary());
                metrics::record_cycle(self.target.id.as_str(), "not_found");
            }
            return Ok(CycleEnd::Continue);
        }

        self.set_phase(LoopPhase::Found);
        metrics::record_cycle(self.target.id.as_str(), "found");
        info!(
            target: "poll-loop",
            attempt = self.state.attempts,
            layers = ?result.contributing,
            "{}",
            result.summary()
        );
        self.archive(&snapshot);

        if self
            .gate
            .should_alert(Instant::now(), self.config.realert_cooldown)
        {
            self.set_phase(LoopPhase::Alerting);
            let delivered_at = self.alert(&result).await;
            self.gate.found(delivered_at);
        } else {
            debug!(target: "poll-loop", "still found; alert suppressed");
            self.gate.found(None);
        }

        match self.config.continuation {
            ContinuationMode::StopOnFind => Ok(CycleEnd::Stop(StopReason::Found)),
            ContinuationMode::KeepMonitoring => Ok(CycleEnd::Continue),
        }
    }

    async fn fetch_failed(
        &mut self,
        session: &mut Option<SessionHandle>,
        err: FetchError,
    ) -> Result<(), WatchError> {
        let lost = err.is_session_lost();
        let watch_err = WatchError::from(err);
        warn!(
            target: "poll-loop",
            attempt = self.state.attempts,
            kind = watch_err.kind(),
            error = %watch_err,
            "fetch failed"
        );
        metrics::record_fetch_failure(self.target.id.as_str(), watch_err.kind());
        metrics::record_cycle(self.target.id.as_str(), "fetch_error");
        self.recoverable(&watch_err);

        if !lost {
            return Ok(());
        }

        if let Some(old) = session.take() {
            self.parts.fetcher.close(old).await;
        }
        self.state.session = None;
        metrics::record_reacquisition(self.target.id.as_str());
        match self.acquire().await {
            Ok(handle) => {
                self.state.reacquisitions += 1;
                info!(target: "poll-loop", session = %handle, "session reacquired");
                *session = Some(handle);
                Ok(())
            }
            // the next top-of-loop check ends the loop
            Err(FetchError::Cancelled) => Ok(()),
            Err(err) => Err(self.fatal(err)),
        }
    }

    async fn acquire(&mut self) -> Result<SessionHandle, FetchError> {
        let options = self
            .config
            .acquire
            .clone()
            .with_timeout(self.config.fetch_timeout)
            .with_marker(self.config.marker.clone())
            .with_cancel(self.cancel.child_token());
        let handle = self.parts.fetcher.acquire(&self.target, &options).await?;
        debug!(target: "poll-loop", session = %handle, "session acquired");
        self.state.session = Some(handle.id.clone());
        self.publish();
        Ok(handle)
    }

    async fn check_readiness(&self, handle: &SessionHandle) {
        let Some(marker) = self.config.marker.as_ref() else {
            return;
        };
        match self
            .parts
            .fetcher
            .await_marker(handle, &marker.selector, marker.timeout)
            .await
        {
            Ok(true) => debug!(target: "poll-loop", marker = %marker.selector, "page ready"),
            Ok(false) => warn!(
                target: "poll-loop",
                marker = %marker.selector,
                "marker not seen after acquisition; polling anyway"
            ),
            Err(err) => warn!(target: "poll-loop", error = %err, "readiness check failed"),
        }
    }

    /// Returns when the alert was delivered, if it was.
    async fn alert(&mut self, result: &FusionResult) -> Option<Instant> {
        let mut record = AlertRecord::new(
            self.target.id.clone(),
            self.target.url.clone(),
            result.details.clone(),
            Utc::now(),
        );
        let outcome = deliver(
            self.parts.notifier.as_ref(),
            &record,
            &self.config.notify_retry,
            &self.cancel,
        )
        .await;
        record.delivery = outcome.clone();

        let delivered_at = match &outcome {
            DeliveryOutcome::Delivered { .. } => {
                self.state.alerts_delivered += 1;
                metrics::record_alert(self.target.id.as_str(), "delivered");
                Some(Instant::now())
            }
            DeliveryOutcome::Failed { last_error, .. } => {
                let err = WatchError::Notifier(last_error.clone());
                error!(target: "poll-loop", error = %err, "alert not delivered");
                metrics::record_alert(self.target.id.as_str(), "failed");
                self.recoverable(&err);
                None
            }
            DeliveryOutcome::Pending => None,
        };
        self.audit(AuditEntry::Alert { record });
        delivered_at
    }

    fn archive(&self, snapshot: &PageSnapshot) {
        if let Some(archive) = self.parts.archive.as_ref() {
            if let Err(err) = archive.store(&self.target.id, snapshot) {
                warn!(target: "poll-loop", error = %err, "failed to archive found snapshot");
            }
        }
    }

    fn audit_layer_errors(&self, result: &FusionResult) {
        for verdict in result
            .verdicts
            .iter()
            .filter(|verdict| verdict.classification == Classification::Error)
        {
            self.recoverable(&WatchError::LayerEvaluation {
                layer: verdict.layer.to_string(),
                message: verdict.evidence.clone(),
            });
        }
    }

    fn recoverable(&self, err: &WatchError) {
        self.audit(AuditEntry::Recoverable {
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
    }

    fn lifecycle(&self, note: String) {
        info!(target: "poll-loop", "{note}");
        self.audit(AuditEntry::Lifecycle { note });
    }

    fn audit(&self, entry: AuditEntry) {
        let record = CycleAudit::new(self.target.id.clone(), self.state.attempts, entry);
        if let Err(err) = self.parts.audit.append(&record) {
            warn!(target: "poll-loop", error = %err, event = record.entry.name(), "audit append failed");
        }
    }

    fn fatal(&self, err: FetchError) -> WatchError {
        let fatal = WatchError::startup(err);
        error!(target: "poll-loop", error = %fatal, "cannot obtain a session");
        self.audit(AuditEntry::Fatal {
            kind: fatal.kind().to_string(),
            message: fatal.to_string(),
        });
        fatal
    }

    fn set_phase(&mut self, phase: LoopPhase) {
        self.state.phase = phase;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(self.state.clone());
    }

    fn finish(&self, reason: StopReason) -> LoopOutcome {
        LoopOutcome {
            reason,
            attempts: self.state.attempts,
            alerts: self.state.alerts_delivered,
            last_result: self.state.last_result.clone(),
        }
    }
}
