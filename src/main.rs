// src/main.rs
//! Session demo entry point
//! Drives a simulated wallet engine through connect, refresh ticks, rescan and close.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use monero_wallet_session::cli::{Cli, Commands};
use monero_wallet_session::core::amount::format_amount;
use monero_wallet_session::core::{NodeConfig, SessionSettings, WalletConfig};
use monero_wallet_session::engine::{Height, SimulatedEngine, SimulatedGateway, WalletGateway};
use monero_wallet_session::session::{RescanRequest, WalletSession};
use monero_wallet_session::tools::SerialExecutor;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEMO_SEED: &str = "sequence atlas unveil summon pebbles tuesday beer rudely snake rockets different fuselage woven tagged bested dented vegan hover rapid fawns obvious muppet randomly seasons randomly";
const DEFAULT_NODE: &str = "http://127.0.0.1:18081";
const TICK: Duration = Duration::from_millis(20);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    info!("Starting session-demo v{}", env!("CARGO_PKG_VERSION"));

    let settings = match &cli.config {
        Some(path) => SessionSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => SessionSettings::default(),
    };
    let node = settings.node.clone().unwrap_or_else(|| NodeConfig::new(DEFAULT_NODE));

    let gateway = SimulatedGateway::new(&cli.wallet_dir);
    let engine = gateway.create_engine(&cli.name, DEMO_SEED)?;
    engine.set_balance(0, 2_500_000_000_000, 2_000_000_000_000);

    let config_path = gateway.config_path_for(&cli.name);
    let config = if config_path.exists() {
        WalletConfig::load(&config_path)?
    } else {
        let config = WalletConfig::new(config_path, false, 0);
        config.save()?;
        config
    };

    let executor = SerialExecutor::new(&settings.executor_label)?;
    let session = WalletSession::new(engine.clone(), gateway.clone(), config, &settings, executor.clone())?;
    let logger = spawn_event_logger(&session);

    session.connect(&node).await?;
    session.start_update();

    match cli.command {
        Commands::Sync { chain_height, step } => {
            engine.set_daemon_height(chain_height);
            scan(&engine, 0, chain_height, step).await;
        }
        Commands::Rescan { height, password, chain_height } => {
            let chain_height = chain_height.unwrap_or(height + 5_000);
            session.rescan(RescanRequest::new(height, password)).await?;

            let recovered = gateway
                .last_recovered()
                .context("gateway did not record the recovered engine")?;
            recovered.set_daemon_height(chain_height);
            session.connect(&node).await?;
            session.start_update();
            scan(&recovered, height, chain_height, chain_height.saturating_sub(height) / 4).await;
        }
    }

    info!(
        status = ?session.sync_status(),
        height = session.current_height(),
        balance = %format_amount(session.balance()?),
        "demo finished"
    );

    session.save().await?;
    session.close();
    executor.flush().await?;
    drop(session);

    if tokio::time::timeout(Duration::from_secs(1), logger).await.is_err() {
        warn!("event logger did not stop");
    }
    Ok(())
}

/// Advance the engine toward `tip`, one refresh tick per step.
async fn scan(engine: &Arc<SimulatedEngine>, from: Height, tip: Height, step: u64) {
    let step = step.max(1);
    let mut height = from;
    while height < tip {
        height = (height + step).min(tip);
        engine.advance_to(height);
        tokio::time::sleep(TICK).await;
    }
}

fn spawn_event_logger(session: &WalletSession) -> tokio::task::JoinHandle<()> {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(?event, "session event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
