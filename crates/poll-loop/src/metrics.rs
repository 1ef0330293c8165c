use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{core::Collector, histogram_opts, HistogramVec, IntCounterVec, Registry};
use tracing::error;

lazy_static! {
    static ref CYCLES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("dropwatch_cycles_total", "Poll cycles by outcome"),
        &["target", "outcome"]
    )
    .unwrap();
    static ref FETCH_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("dropwatch_fetch_failures_total", "Failed fetches by kind"),
        &["target", "kind"]
    )
    .unwrap();
    static ref SESSION_REACQUISITIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "dropwatch_session_reacquisitions_total",
            "Sessions replaced after being lost"
        ),
        &["target"]
    )
    .unwrap();
    static ref ALERTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("dropwatch_alerts_total", "Alert deliveries by outcome"),
        &["target", "outcome"]
    )
    .unwrap();
    static ref FETCH_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "dropwatch_fetch_duration_seconds",
            "Fetch latency, successful or not",
            vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]
        ),
        &["target"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register poll metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, CYCLES_TOTAL.clone());
    register(registry, FETCH_FAILURES_TOTAL.clone());
    register(registry, SESSION_REACQUISITIONS_TOTAL.clone());
    register(registry, ALERTS_TOTAL.clone());
    register(registry, FETCH_DURATION.clone());
}

pub fn record_cycle(target: &str, outcome: &str) {
    CYCLES_TOTAL.with_label_values(&[target, outcome]).inc();
}

pub fn record_fetch(target: &str, elapsed: Duration) {
    FETCH_DURATION
        .with_label_values(&[target])
        .observe(elapsed.as_secs_f64());
}

pub fn record_fetch_failure(target: &str, kind: &str) {
    FETCH_FAILURES_TOTAL.with_label_values(&[target, kind]).inc();
}

pub fn record_reacquisition(target: &str) {
    SESSION_REACQUISITIONS_TOTAL.with_label_values(&[target]).inc();
}

pub fn record_alert(target: &str, outcome: &str) {
    ALERTS_TOTAL.with_label_values(&[target, outcome]).inc();
}
