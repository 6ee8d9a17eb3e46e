//! Engine replacement from seed
//!
//! A rescan closes the current engine, deletes its wallet files and recovers a
//! new engine from the same seed at a chosen restore height. The session is
//! `Rescanning` for the whole procedure and returns to `Idle` on every exit
//! path. Whenever an engine is in place at the end, it is listened to again,
//! even if persisting the wallet config failed. When a step fails after the old
//! engine was released, the session is left without an engine and reports
//! [`WalletError::EngineUnavailable`] until a rescan succeeds.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};
use zeroize::Zeroizing;

use super::{SessionShared, WalletSession};
use crate::core::errors::WalletError;
use crate::engine::Height;

/// Target restore height and unlock password, consumed by one rescan.
pub struct RescanRequest {
    height: Height,
    password: SecretString,
}

impl RescanRequest {
    pub fn new(height: Height, password: impl Into<String>) -> Self {
        Self { height, password: SecretString::new(password.into()) }
    }

    pub fn height(&self) -> Height {
        self.height
    }
}

impl fmt::Debug for RescanRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RescanRequest")
            .field("height", &self.height)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl WalletSession {
    /// Replace the engine with one recovered from seed at `request.height`.
    ///
    /// The whole replacement runs as one executor job that also owns the
    /// `Rescanning` state, so dropping the returned future does not cut it short.
    pub async fn rescan(&self, request: RescanRequest) -> Result<(), WalletError> {
        let guard = self.shared.state.begin_rescan().map_err(|state| {
            WalletError::SessionBlocked(format!("rescan rejected while session is {:?}", state))
        })?;
        info!(wallet = %self.name(), height = request.height, "rescan started");

        let shared = self.shared.clone();
        let replaced = self
            .shared
            .executor
            .run(move || {
                let result = shared.replace_engine(request);
                drop(guard);
                shared.reattach_listener();
                result
            })
            .await;

        match replaced.and_then(|r| r) {
            Ok(()) => {
                info!(wallet = %self.name(), "✅ rescan engine in place");
                Ok(())
            }
            Err(e) => {
                warn!(wallet = %self.name(), "rescan failed: {}", e);
                Err(e)
            }
        }
    }
}

impl SessionShared {
    fn replace_engine(&self, request: RescanRequest) -> Result<(), WalletError> {
        let old = self.engine()?;
        let name = old.name();
        let seed = Zeroizing::new(old.seed());

        old.set_listener(None);
        old.close();
        old.clear();
        self.engine.write().take();
        self.chain_height.lock().clear_refresh();
        self.history.lock().take();
        drop(old);

        self.gateway.remove(&name).map_err(|e| {
            WalletError::RescanError(format!("failed to remove wallet files of '{}': {}", name, e))
        })?;

        let path = self.gateway.path_for(&name);
        let engine = self
            .gateway
            .recover_engine(&path, &seed, request.password.expose_secret(), request.height)
            .map_err(|e| WalletError::RescanError(format!("failed to recover '{}': {}", name, e)))?;

        *self.engine.write() = Some(engine.clone());
        self.attach_chain_height(engine);
        self.history.lock().take();

        let config = {
            let mut config = self.config.write();
            config.is_recovery = true;
            config.restore_height = request.height;
            config.persist_path = self.gateway.config_path_for(&name);
            config.clone()
        };
        config.save()
    }

    /// Route events of whatever engine the session owns to the dispatcher.
    /// Skipped once a close has taken over.
    fn reattach_listener(&self) {
        if self.state.get().is_blocking() {
            return;
        }
        if let Some(engine) = self.engine.read().as_ref() {
            engine.set_listener(Some(self.listener.clone()));
        }
    }
}
