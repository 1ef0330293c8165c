use anyhow::Result;
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

#[derive(Serialize)]
struct LayerRow {
    id: String,
    role: String,
    risk: String,
}

pub fn cmd_layers(ctx: &CliContext) -> Result<()> {
    let registry = ctx.config().layer_registry()?;
    let rows: Vec<LayerRow> = registry
        .layers()
        .map(|layer| LayerRow {
            id: layer.id().to_string(),
            role: layer.role().to_string(),
            risk: layer.risk().to_string(),
        })
        .collect();

    match ctx.output() {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&rows)?),
        OutputFormat::Human => {
            for row in &rows {
                println!("{:<20} {:<14} {}", row.id, row.role, row.risk);
            }
            println!();
            println!("fusion rule: {}", ctx.config().fusion.rule());
            if let Some(path) = ctx.config_path() {
                println!("config: {}", path.display());
            }
        }
    }
    Ok(())
}
