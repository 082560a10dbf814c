//! Bourse host process.
//!
//! Builds an in-memory exchange from the node config, drives the
//! periodic ticks and relays market events to the log until Ctrl-C.

mod config;
mod driver;
mod relay;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use bourse_engine::Exchange;
use bourse_store::MemoryStore;
use bourse_types::SystemClock;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, NodeConfig};
use crate::relay::BroadcastSink;

#[derive(Parser, Debug)]
#[command(name = "bourse-node", version, about = "Run the Bourse listing exchange")]
struct Cli {
    /// JSON config file. Defaults apply when omitted; `BOURSE_*`
    /// variables override either.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the config, print it and exit.
    #[arg(long)]
    check: bool,
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref())?;
    if cli.check {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    init_tracing(config.log_format)?;

    let sink = BroadcastSink::new(config.event_buffer);
    let events = sink.subscribe();
    let store = Arc::new(MemoryStore::new(config.engine.retry.clone()));
    let exchange = Arc::new(
        Exchange::new(config.engine.clone(), store, Arc::new(SystemClock), Arc::new(sink))
            .context("failed to build exchange")?,
    );
    info!(
        match_atomicity = ?config.engine.match_atomicity,
        fee_rate = %config.engine.fee_rate,
        "bourse node starting"
    );

    let relay = tokio::spawn(relay::log_events(events));
    let ticks = tokio::spawn(driver::drive(Arc::clone(&exchange), config.ticks.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    ticks.abort();
    let _ = ticks.await;
    // The relay drains whatever is buffered once the last sink is gone.
    drop(exchange);
    let _ = relay.await;
    info!("bourse node stopped");
    Ok(())
}
