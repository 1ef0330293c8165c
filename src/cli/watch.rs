use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use dropwatch_audit_log::{AuditSink, JsonlAuditLog, NullAuditLog, SnapshotArchive};
use dropwatch_core_types::{Target, TargetId};
use dropwatch_fusion_policy::{FusionPolicy, FusionRule};
use dropwatch_notifier::{LogNotifier, Notifier, WebhookNotifier};
use dropwatch_page_fetcher::{ChromiumFetcher, Fetcher};
use dropwatch_poll_loop::{Collaborators, ContinuationMode, LoopOutcome, PollLoop};
use serde_json::json;
use tokio::{signal, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;
use crate::config::{NotifierKind, TargetConfig, WatchConfig};
use crate::metrics;

#[derive(Args, Clone, Debug)]
pub struct WatchArgs {
    /// Watch only this URL instead of the configured targets
    #[arg(long, value_name = "URL")]
    pub target: Option<String>,

    /// Stop each target after its first positive decision
    #[arg(long)]
    pub stop_on_find: bool,

    /// Log alerts instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Stop each target after this many cycles
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u64>,

    /// Fusion rule override, e.g. `any-positive` or `conjunctive:status-text,seat-listing@price`
    #[arg(long, value_name = "RULE")]
    pub rule: Option<FusionRule>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
}

pub async fn cmd_watch(args: WatchArgs, ctx: &CliContext) -> Result<()> {
    let config = prepare_config(&args, ctx.config().clone())?;
    let _metrics_server = metrics::spawn_metrics_server(ctx.metrics_port());

    let fetcher: Arc<dyn Fetcher> = Arc::new(ChromiumFetcher::new(config.fetcher_config()));
    let notifier = build_notifier(&config, args.dry_run)?;
    let cancel = CancellationToken::new();
    let _shutdown = spawn_shutdown_listener(cancel.clone());

    let mut loops = JoinSet::new();
    for target in config.target_list() {
        let watcher = build_loop(
            &config,
            target,
            fetcher.clone(),
            notifier.clone(),
            cancel.child_token(),
        )?;
        let id = watcher.target().id.clone();
        info!(watch = %id, url = %watcher.target().url, "watch starting");
        loops.spawn(async move { (id, watcher.run().await) });
    }

    let mut fatal = Vec::new();
    while let Some(joined) = loops.join_next().await {
        match joined {
            Ok((id, Ok(outcome))) => report(ctx.output(), &id, &outcome)?,
            Ok((id, Err(err))) => {
                error!(watch = %id, error = %err, "watch ended with a fatal error");
                fatal.push(format!("{id}: {err}"));
            }
            Err(err) => {
                error!(?err, "watch task panicked");
                fatal.push(err.to_string());
            }
        }
    }
    cancel.cancel();

    if !fatal.is_empty() {
        bail!("{} watch(es) failed: {}", fatal.len(), fatal.join("; "));
    }
    Ok(())
}

/// Folds command-line overrides into the loaded config and validates it.
pub(crate) fn prepare_config(args: &WatchArgs, mut config: WatchConfig) -> Result<WatchConfig> {
    if let Some(url) = &args.target {
        config.targets = vec![TargetConfig::from_url(url)];
    }
    if args.stop_on_find {
        config.continuation = ContinuationMode::StopOnFind;
    }
    if let Some(max) = args.max_attempts {
        config.max_attempts = Some(max);
    }
    if let Some(rule) = &args.rule {
        config.fusion = FusionPolicy::new(rule.clone());
    }
    if args.headful {
        config.fetch.headless = false;
    }
    if args.dry_run {
        config.notifier.kind = NotifierKind::Log;
    }
    config.validate().context("invalid watch configuration")?;
    Ok(config)
}

fn build_notifier(config: &WatchConfig, dry_run: bool) -> Result<Arc<dyn Notifier>> {
    if dry_run || config.notifier.kind == NotifierKind::Log {
        if dry_run {
            info!("dry run: alerts will only be logged");
        }
        return Ok(Arc::new(LogNotifier::new()));
    }
    let webhook = config
        .webhook_config()
        .context("webhook notifier selected without a url")?;
    Ok(Arc::new(WebhookNotifier::new(webhook)?))
}

fn build_loop(
    config: &WatchConfig,
    target: Target,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
) -> Result<PollLoop> {
    let audit: Arc<dyn AuditSink> = if config.audit.enabled {
        Arc::new(JsonlAuditLog::new(
            &config.audit.dir,
            &target.id,
            config.audit.rotate_bytes,
        ))
    } else {
        Arc::new(NullAuditLog)
    };
    let archive = config
        .audit
        .archive_found
        .then(|| SnapshotArchive::new(config.audit.dir.clone()));

    Ok(PollLoop::new(
        target,
        config.poll_config(),
        config.layer_registry()?,
        config.fusion.clone(),
        Collaborators {
            fetcher,
            notifier,
            audit,
            archive,
        },
        cancel,
    ))
}

fn report(output: OutputFormat, id: &TargetId, outcome: &LoopOutcome) -> Result<()> {
    match output {
        OutputFormat::Human => {
            println!(
                "{id}: stopped ({}) after {} attempt(s), {} alert(s) delivered",
                outcome.reason, outcome.attempts, outcome.alerts
            );
            if let Some(result) = &outcome.last_result {
                println!("  last decision: {}", result.summary());
            }
        }
        OutputFormat::Json => {
            println!("{}", json!({ "target": id, "outcome": outcome }));
        }
        OutputFormat::Yaml => {
            print!(
                "{}",
                serde_yaml::to_string(&json!({ "target": id, "outcome": outcome }))?
            );
        }
    }
    Ok(())
}

fn spawn_shutdown_listener(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested; stopping after the current cycle");
        cancel.cancel();
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(?err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(?err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> WatchArgs {
        WatchArgs {
            target: None,
            stop_on_find: false,
            dry_run: false,
            max_attempts: None,
            rule: None,
            headful: false,
        }
    }

    #[test]
    fn target_flag_replaces_configured_targets() {
        let mut config = WatchConfig::default();
        config.targets = vec![TargetConfig {
            id: "old".into(),
            url: "https://example.com/old".into(),
        }];
        let prepared = prepare_config(
            &WatchArgs {
                target: Some("https://www.ticketmaster.co.uk/event/1F00".into()),
                stop_on_find: true,
                ..args()
            },
            config,
        )
        .unwrap();
        assert_eq!(prepared.targets.len(), 1);
        assert_eq!(prepared.targets[0].id, "1F00");
        assert_eq!(prepared.continuation, ContinuationMode::StopOnFind);
    }

    #[test]
    fn dry_run_does_not_need_a_webhook() {
        let mut config = WatchConfig::default();
        config.targets = vec![TargetConfig::from_url("https://example.com/e/1")];
        config.notifier.kind = NotifierKind::Webhook;
        assert!(prepare_config(&args(), config.clone()).is_err());
        let prepared = prepare_config(
            &WatchArgs {
                dry_run: true,
                ..args()
            },
            config,
        )
        .unwrap();
        assert_eq!(prepared.notifier.kind, NotifierKind::Log);
    }

    #[test]
    fn rule_naming_disabled_layer_is_rejected() {
        let mut config = WatchConfig::default();
        config.targets = vec![TargetConfig::from_url("https://example.com/e/1")];
        config.layers.enabled = vec!["status-text".into()];
        let err = prepare_config(
            &WatchArgs {
                rule: Some("authoritative:seat-listing".parse().unwrap()),
                ..args()
            },
            config,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("seat-listing"));
    }
}
