use anyhow::{Context, Result};
use clap::Parser;
use dss_common::NetworkId;
use dss_keeper::{Cadence, KeeperNode, KeeperSettings, TickOutcome};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "keeper")]
#[clap(about = "DSS keeper - runs sequencer jobs and protocol maintenance on a schedule")]
struct Args {
    #[clap(long, env = "RPC_URL")]
    rpc_url: String,

    #[clap(short = 'k', long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    /// Directory holding `<chain-id>/*.json` deployment artifacts
    #[clap(short, long, env = "ARTIFACTS_DIR")]
    artifacts_dir: PathBuf,

    #[clap(short, long, env = "KEEPER_NETWORK", default_value = "NTWK-MAIN")]
    network: String,

    #[clap(long, env = "KEEPER_INTERVAL_SECS", default_value = "60")]
    interval_secs: u64,

    /// Cron expression; takes precedence over the interval
    #[clap(long, env = "KEEPER_SCHEDULE")]
    schedule: Option<String>,

    /// JSON settings file (gas ceilings, thresholds, strategies)
    #[clap(short, long, env = "KEEPER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Run a single tick and exit
    #[clap(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting DSS Keeper");

    let network = NetworkId::from_label(&args.network).context("invalid network label")?;
    let settings = KeeperSettings::load(args.settings.as_deref())?;
    let cadence = match &args.schedule {
        Some(expr) => Cadence::cron(expr)?,
        None => Cadence::every(Duration::from_secs(args.interval_secs))?,
    };

    let keeper = KeeperNode::new(
        &args.rpc_url,
        &args.private_key,
        &args.artifacts_dir,
        network,
        &settings,
    )
    .await?;

    if args.once {
        if let TickOutcome::Aborted(e) = keeper.run_once().await {
            error!("Tick aborted: {}", e);
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received Ctrl-C, finishing current tick");
        signal.cancel();
    });

    keeper.run(&cadence, shutdown).await;

    Ok(())
}
