use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::time::MissedTickBehavior;

use feed_harvester::config::Config;
use feed_harvester::round::{self, RoundReport};
use feed_harvester::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "harvester", about = "Feed aggregation daemon")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Run a single round and exit instead of looping on the interval
    #[arg(long)]
    once: bool,
}

/// Open the store and run one round.
///
/// The store is opened per round so that transient connectivity failures
/// abort only the round they hit; the scheduler keeps ticking.
async fn run_once(config: &Config, client: &reqwest::Client) -> Result<RoundReport> {
    tracing::info!("Starting feed round");
    let db = Database::open(&config.database)
        .await
        .context("Failed to open store")?;

    let report = round::run_round(&db, client, config.index_url.as_deref()).await?;

    tracing::info!(
        sources = report.sources_total,
        fetched = report.sources_fetched,
        updated = report.sources_updated,
        posts_seen = report.posts_seen,
        posts_inserted = report.posts_inserted,
        tags_linked = report.tags_linked,
        media_links = report.media_links,
        index_notified = ?report.index_notified,
        "Feed round finished"
    );
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config).context("Failed to load configuration")?;
    let client = reqwest::Client::new();

    if args.once {
        run_once(&config, &client).await?;
        return Ok(());
    }

    let period = config.round_period();
    tracing::info!(interval_minutes = config.interval_minutes, "Scheduling feed rounds");

    // First tick fires immediately; rounds are awaited to completion, so a
    // round that overruns the period delays its successor instead of
    // overlapping it.
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = run_once(&config, &client).await {
            tracing::error!(error = %e, "Feed round aborted");
        }
    }
}
