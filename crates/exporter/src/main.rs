//! Aula bulk exporter
//!
//! Downloads every grade report of a division from the gateway and writes
//! one CSV per subject. Requests run one at a time with a fixed pause in
//! between so the gateway is never flooded.

mod client;
mod runner;

use crate::client::ApiClient;
use crate::runner::Exporter;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "export-all", version, about = "Export all grade reports of a division as CSV")]
struct Args {
    /// Gateway base URL
    #[arg(long, env = "AULA_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Bearer token of a staff user
    #[arg(long, env = "AULA_TOKEN", hide_env_values = true)]
    token: String,

    #[arg(long)]
    division_id: Uuid,

    /// Academic period (1 or 2)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    period: u8,

    #[arg(long, default_value = "exports")]
    output_dir: PathBuf,

    /// Pause between report requests
    #[arg(long, env = "AULA_EXPORT_DELAY_MS", default_value_t = 800)]
    delay_ms: u64,

    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    info!(division_id = %args.division_id, period = args.period, "Starting export");

    let client = ApiClient::new(&args.api_url, &args.token, Duration::from_secs(args.timeout_secs))?;
    let exporter = Exporter::new(client, &args.output_dir, Duration::from_millis(args.delay_ms));

    let summary = exporter.run(args.division_id, args.period).await?;
    println!("{}", summary);

    if !summary.is_clean() {
        error!(errors = summary.errors, "Export finished with errors");
        std::process::exit(1);
    }

    Ok(())
}
