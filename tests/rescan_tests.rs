mod util;

use std::sync::Arc;
use std::time::Duration;

use monero_wallet_session::core::WalletConfig;
use monero_wallet_session::engine::{EngineEvent, TransactionPriority, WalletGateway};
use monero_wallet_session::session::{RescanRequest, SessionState};
use monero_wallet_session::WalletError;
use util::{harness, wait_for_state, SEED, WALLET};

#[tokio::test]
async fn test_rescan_replaces_engine_and_history() {
    let h = harness(false, 0);
    let history_before = h.session.transaction_history().unwrap();

    h.session.rescan(RescanRequest::new(700_000, "x")).await.unwrap();

    let recovered = h.gateway.last_recovered().unwrap();
    assert!(!Arc::ptr_eq(&recovered, &h.engine));
    assert_eq!(h.session.state(), SessionState::Idle);

    let config = h.session.config();
    assert!(config.is_recovery);
    assert_eq!(config.restore_height, 700_000);
    let persisted = WalletConfig::load(&h.gateway.config_path_for(WALLET)).unwrap();
    assert!(persisted.is_recovery);
    assert_eq!(persisted.restore_height, 700_000);

    let history_after = h.session.transaction_history().unwrap();
    assert!(!Arc::ptr_eq(&history_before, &history_after));
    assert!(Arc::ptr_eq(&history_after, &h.session.transaction_history().unwrap()));
}

#[tokio::test]
async fn test_rescan_moves_listener_to_new_engine() {
    let h = harness(false, 0);
    h.session.rescan(RescanRequest::new(700_000, "x")).await.unwrap();
    let recovered = h.gateway.last_recovered().unwrap();

    assert_eq!(h.engine.close_count(), 1);
    assert!(!h.engine.has_listener());
    assert!(!h.engine.emit(EngineEvent::Refreshed));
    assert!(recovered.has_listener());
    assert_eq!(recovered.password(), "x");
    assert_eq!(h.session.seed().unwrap().as_str(), SEED);
}

#[tokio::test]
async fn test_rescan_reports_restore_height_until_first_refresh() {
    let h = harness(false, 0);
    h.engine.set_current_height(900_000);
    h.session.rescan(RescanRequest::new(700_000, "x")).await.unwrap();

    assert_eq!(h.session.current_height(), 700_000);
    h.gateway.last_recovered().unwrap().set_current_height(700_123);
    assert_eq!(h.session.current_height(), 700_123);
}

#[tokio::test]
async fn test_rescan_chain_height_reads_new_engine() {
    let h = harness(false, 0);
    h.engine.set_daemon_height(1_000);
    assert_eq!(h.session.blockchain_height().unwrap(), 1_000);

    h.session.rescan(RescanRequest::new(700_000, "x")).await.unwrap();
    h.gateway.last_recovered().unwrap().set_daemon_height(2_000);
    assert_eq!(h.session.blockchain_height().unwrap(), 2_000);
}

#[tokio::test]
async fn test_failed_file_removal_leaves_session_usable() {
    let h = harness(false, 0);
    h.gateway.fail_remove(Some("permission denied"));

    let err = h.session.rescan(RescanRequest::new(700_000, "x")).await.unwrap_err();
    assert!(matches!(err, WalletError::RescanError(_)));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(!h.session.has_engine());

    assert!(matches!(h.session.balance(), Err(WalletError::EngineUnavailable(_))));
    assert!(matches!(h.session.save().await, Err(WalletError::EngineUnavailable(_))));
    assert_eq!(h.session.state(), SessionState::Idle);

    h.session.close();
    h.executor.flush().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_failed_recovery_clears_blocking_state() {
    let h = harness(false, 0);
    h.gateway.fail_recover(Some("invalid mnemonic"));

    let err = h.session.rescan(RescanRequest::new(700_000, "x")).await.unwrap_err();
    assert!(matches!(err, WalletError::RescanError(_)));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.gateway.last_recovered().is_none());
}

#[tokio::test]
async fn test_rescan_waits_for_in_flight_save() {
    let h = harness(false, 0);
    h.engine.set_save_delay(Duration::from_millis(150));

    let session = h.session.clone();
    let save = tokio::spawn(async move { session.save().await });
    wait_for_state(&h.session, SessionState::Saving).await;

    let session = h.session.clone();
    let rescan = tokio::spawn(async move { session.rescan(RescanRequest::new(700_000, "x")).await });
    wait_for_state(&h.session, SessionState::Rescanning).await;

    save.await.unwrap().unwrap();
    rescan.await.unwrap().unwrap();

    assert_eq!(h.engine.save_count(), 1);
    assert_eq!(h.engine.close_count(), 1);
    assert_eq!(h.session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_concurrent_rescan_is_rejected() {
    let h = harness(false, 0);
    h.engine.set_close_delay(Duration::from_millis(150));

    let session = h.session.clone();
    let first = tokio::spawn(async move { session.rescan(RescanRequest::new(700_000, "x")).await });
    wait_for_state(&h.session, SessionState::Rescanning).await;

    let err = h.session.rescan(RescanRequest::new(800_000, "y")).await.unwrap_err();
    assert!(matches!(err, WalletError::SessionBlocked(_)));
    first.await.unwrap().unwrap();
    assert_eq!(h.session.config().restore_height, 700_000);
}

#[tokio::test]
async fn test_config_write_failure_keeps_new_engine_listened() {
    let h = harness(false, 0);
    let config_path = h.gateway.config_path_for(WALLET);
    std::fs::remove_file(&config_path).unwrap();
    std::fs::create_dir(&config_path).unwrap();

    let err = h.session.rescan(RescanRequest::new(700_000, "x")).await.unwrap_err();
    assert!(matches!(err, WalletError::ConfigError(_)));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.session.has_engine());

    let recovered = h.gateway.last_recovered().unwrap();
    assert!(recovered.has_listener());
    assert!(recovered.emit(EngineEvent::Refreshed));
}

#[tokio::test]
async fn test_abandoned_rescan_still_completes() {
    let h = harness(false, 0);
    h.engine.set_close_delay(Duration::from_millis(300));

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), h.session.rescan(RescanRequest::new(700_000, "x"))).await;
    assert!(abandoned.is_err());
    assert_eq!(h.session.state(), SessionState::Rescanning);
    assert!(h.session.send(Some("1"), "44AFFq5kSiGBoZ", None, TransactionPriority::Default).is_err());

    h.executor.flush().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.session.has_engine());
    assert!(h.gateway.last_recovered().unwrap().has_listener());
    assert_eq!(h.session.config().restore_height, 700_000);
}
