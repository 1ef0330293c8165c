use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use dropwatch_core_types::{AlertRecord, FusionResult, PageSnapshot, TargetId};
use dropwatch_fusion_policy::{FusionPolicy, FusionRule};
use dropwatch_poll_loop::evaluate;
use tokio::fs;

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Saved page to evaluate
    #[arg(value_name = "HTML_FILE")]
    pub html: PathBuf,

    /// Fusion rule override, e.g. `any-positive`
    #[arg(long, value_name = "RULE")]
    pub rule: Option<FusionRule>,

    /// Page URL shown in the alert preview
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
}

pub async fn cmd_check(args: CheckArgs, ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let registry = config.layer_registry()?;
    let policy = match &args.rule {
        Some(rule) => FusionPolicy::new(rule.clone()),
        None => config.fusion.clone(),
    };
    policy.validate(&registry.ids())?;

    let markup = fs::read_to_string(&args.html)
        .await
        .with_context(|| format!("failed to read {}", args.html.display()))?;
    let source = args
        .url
        .clone()
        .unwrap_or_else(|| args.html.display().to_string());
    let snapshot = PageSnapshot::new(markup, Utc::now(), source);
    let result = evaluate(&registry, &policy, &snapshot);

    match ctx.output() {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&result)?),
        OutputFormat::Human => print_human(&result, snapshot.source()),
    }
    Ok(())
}

fn print_human(result: &FusionResult, source: &str) {
    println!("{:<20} {:<14} {:<9} EVIDENCE", "LAYER", "ROLE", "VERDICT");
    for verdict in &result.verdicts {
        println!(
            "{:<20} {:<14} {:<9} {}",
            verdict.layer.as_str(),
            verdict.role.as_str(),
            verdict.classification.as_str(),
            verdict.evidence
        );
    }
    println!();
    println!("{}", result.summary());

    if result.found {
        let preview = AlertRecord::new(
            TargetId::new("check"),
            source,
            result.details.clone(),
            result.evaluated_at,
        );
        println!();
        println!("Alert preview: {}", preview.subject());
        println!("{}", preview.body());
    }
}
