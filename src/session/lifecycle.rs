//! Connection and persistence lifecycle

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, warn};

use super::{SyncStatus, WalletSession};
use crate::core::{errors::WalletError, NodeConfig};

impl WalletSession {
    /// Point the engine at `node` and open the connection.
    ///
    /// A no-op while the session is closing or rescanning.
    pub async fn connect(&self, node: &NodeConfig) -> Result<(), WalletError> {
        if self.state().is_blocking() {
            debug!(wallet = %self.name(), state = ?self.state(), "connect skipped");
            return Ok(());
        }
        let engine = self.engine()?;
        self.set_sync_status(SyncStatus::Connecting);

        let node = node.clone();
        let uri = node.uri.clone();
        let result = tokio::task::spawn_blocking(move || {
            engine.set_daemon_address(&node.uri, node.login.as_deref(), node.password.as_deref());
            engine.connect_to_daemon()
        })
        .await
        .map_err(|e| WalletError::AsyncError(format!("connect task failed: {}", e)))?;

        match result {
            Ok(()) => {
                info!(wallet = %self.name(), node = %uri, "connected to daemon");
                Ok(())
            }
            Err(e) => {
                warn!(wallet = %self.name(), node = %uri, "connection failed: {}", e);
                self.set_sync_status(SyncStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Ask the engine to start a background refresh.
    pub fn start_update(&self) {
        if self.state().is_blocking() {
            debug!(wallet = %self.name(), state = ?self.state(), "start_update skipped");
            return;
        }
        match self.engine() {
            Ok(engine) => {
                self.set_sync_status(SyncStatus::StartingSync);
                engine.start_refresh_async();
            }
            Err(e) => warn!("start_update: {}", e),
        }
    }

    /// Persist the wallet on the serial executor.
    ///
    /// A no-op while another save is in flight or the session is blocking.
    /// `Saving` is held by the executor job, so dropping the returned future
    /// does not let a second save in before the first one finishes.
    pub async fn save(&self) -> Result<(), WalletError> {
        let Some(guard) = self.shared.state.begin_save() else {
            debug!(wallet = %self.name(), state = ?self.state(), "save skipped");
            return Ok(());
        };
        let engine = self.engine()?;
        self.shared
            .executor
            .run(move || {
                let _guard = guard;
                engine.save()
            })
            .await??;
        debug!(wallet = %self.name(), "wallet saved");
        Ok(())
    }

    /// Begin closing the session.
    ///
    /// Every operation issued after this returns is rejected. Engine teardown
    /// runs later on the serial executor; its completion shows up as
    /// [`SessionState::Closed`](super::SessionState::Closed) and a
    /// `NotConnected` status.
    pub fn close(&self) {
        if !self.shared.state.begin_close() {
            debug!(wallet = %self.name(), state = ?self.state(), "close skipped");
            return;
        }
        if let Some(engine) = self.shared.engine.read().as_ref() {
            engine.set_listener(None);
        }

        let shared = self.shared.clone();
        let queued = self.shared.executor.spawn(move || {
            let engine = shared.engine.write().take();
            if let Some(engine) = engine {
                engine.close();
                engine.clear();
            }
            shared.chain_height.lock().clear_refresh();
            shared.history.lock().take();
            shared.state.finish_close();
            shared.set_sync_status(SyncStatus::NotConnected);
            info!(wallet = %shared.name, session = %shared.id, "wallet session closed");
        });
        if let Err(e) = queued {
            error!(wallet = %self.name(), "failed to queue teardown: {}", e);
        }
    }

    /// Change the wallet password on the serial executor.
    pub async fn change_password(&self, password: SecretString) -> Result<(), WalletError> {
        self.ensure_not_blocking("change_password")?;
        let engine = self.engine()?;
        self.shared
            .executor
            .run(move || engine.set_password(password.expose_secret()))
            .await??;
        info!(wallet = %self.name(), "wallet password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use secrecy::SecretString;

    use crate::core::{errors::WalletError, NodeConfig, SessionSettings, WalletConfig};
    use crate::engine::{SimulatedEngine, SimulatedGateway};
    use crate::session::{SessionState, SyncStatus, WalletSession};
    use crate::tools::SerialExecutor;

    fn session(engine: &Arc<SimulatedEngine>, dir: &std::path::Path) -> WalletSession {
        let gateway = SimulatedGateway::new(dir);
        let config = WalletConfig::new(dir.join("w.config.json"), false, 0);
        let executor = SerialExecutor::new("lifecycle-test").unwrap();
        WalletSession::new(engine.clone(), gateway, config, &SessionSettings::default(), executor).unwrap()
    }

    #[tokio::test]
    async fn test_connect_failure_sets_failed_status() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SimulatedEngine::new("w", "seed");
        engine.fail_connect(Some("connection refused"));
        let session = session(&engine, dir.path());

        let err = session.connect(&NodeConfig::new("http://node:18081")).await.unwrap_err();
        assert!(matches!(err, WalletError::EngineError(_)));
        assert!(matches!(session.sync_status(), SyncStatus::Failed(_)));
        assert_eq!(engine.node().as_deref(), Some("http://node:18081"));
    }

    #[tokio::test]
    async fn test_change_password_reaches_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SimulatedEngine::new("w", "seed");
        let session = session(&engine, dir.path());

        session.change_password(SecretString::new("hunter2".to_string())).await.unwrap();
        assert_eq!(engine.password(), "hunter2");
    }

    #[tokio::test]
    async fn test_close_tears_down_on_executor() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SimulatedEngine::new("w", "seed");
        let session = session(&engine, dir.path());
        assert!(engine.has_listener());

        session.close();
        assert_eq!(session.state(), SessionState::Closing);
        assert!(!engine.has_listener());

        session.shared.executor.flush().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(engine.close_count(), 1);
        assert_eq!(engine.clear_count(), 1);
        assert!(!session.has_engine());
        assert_eq!(session.sync_status(), SyncStatus::NotConnected);
    }
}
