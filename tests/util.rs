// tests/util.rs
// Shared helpers for session integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use monero_wallet_session::core::{SessionSettings, WalletConfig};
use monero_wallet_session::engine::{Height, SimulatedEngine, SimulatedGateway, WalletGateway};
use monero_wallet_session::session::{SessionEvent, SessionState, WalletSession};
use monero_wallet_session::tools::SerialExecutor;
use tempfile::TempDir;
use tokio::sync::broadcast;

pub const WALLET: &str = "alice";
pub const SEED: &str = "tissue fabric vortex bogeys sprig nucleus duties ocean";

/// A session over a simulated engine whose files live in a temp dir.
pub struct Harness {
    pub dir: TempDir,
    pub gateway: Arc<SimulatedGateway>,
    pub engine: Arc<SimulatedEngine>,
    pub executor: SerialExecutor,
    pub session: WalletSession,
}

pub fn harness(is_recovery: bool, restore_height: Height) -> Harness {
    harness_with(SessionSettings::default(), is_recovery, restore_height)
}

pub fn harness_with(settings: SessionSettings, is_recovery: bool, restore_height: Height) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let gateway = SimulatedGateway::new(dir.path());
    let engine = gateway.create_engine(WALLET, SEED).expect("create engine");

    let config = WalletConfig::new(gateway.config_path_for(WALLET), is_recovery, restore_height);
    config.save().expect("save config");

    let executor = SerialExecutor::new("test-serial").expect("executor");
    let session = WalletSession::new(engine.clone(), gateway.clone(), config, &settings, executor.clone())
        .expect("session");

    Harness { dir, gateway, engine, executor, session }
}

/// Next event, or `None` if nothing arrives within a second.
pub async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> Option<SessionEvent> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.ok()?.ok()
}

/// Wait for the first event matching `predicate`, skipping others.
pub async fn wait_for_event<F>(rx: &mut broadcast::Receiver<SessionEvent>, predicate: F) -> Option<SessionEvent>
where
    F: Fn(&SessionEvent) -> bool,
{
    while let Some(event) = next_event(rx).await {
        if predicate(&event) {
            return Some(event);
        }
    }
    None
}

/// Everything already queued, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Poll until the session reaches `state`; panics after a second.
pub async fn wait_for_state(session: &WalletSession, state: SessionState) {
    for _ in 0..200 {
        if session.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session never reached {:?}, still {:?}", state, session.state());
}
