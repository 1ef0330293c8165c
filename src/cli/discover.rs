use std::env;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use reqwest::Client;

use crate::discovery::{discover, write_csv, DiscoveryQuery, DISCOVERY_ENDPOINT};
use crate::errors::DiscoveryError;

#[derive(Args, Clone, Debug)]
pub struct DiscoverArgs {
    /// ISO country code of the market to search
    #[arg(long, default_value = "GB")]
    pub country: String,

    /// Result pages to walk
    #[arg(long, default_value_t = 10)]
    pub pages: u32,

    /// Events per page
    #[arg(long, default_value_t = 100)]
    pub size: u32,

    /// CSV file to write
    #[arg(long, value_name = "FILE", default_value = "sold_out_concerts.csv")]
    pub out: PathBuf,

    #[arg(long, default_value = DISCOVERY_ENDPOINT, hide = true)]
    pub endpoint: String,
}

pub async fn cmd_discover(args: DiscoverArgs) -> Result<()> {
    let api_key = env::var("TM_API_KEY").map_err(|_| DiscoveryError::MissingApiKey)?;
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;
    let query = DiscoveryQuery {
        endpoint: args.endpoint.clone(),
        api_key,
        country: args.country.clone(),
        page_size: args.size,
        pages: args.pages,
    };

    let events = discover(&client, &query, Utc::now()).await?;
    let file = File::create(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    write_csv(file, &events)?;
    println!("Saved {} events to {}", events.len(), args.out.display());
    Ok(())
}
