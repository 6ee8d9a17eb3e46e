//! Sync status resolution
//!
//! [`resolve_sync`] is the pure decision taken on every engine refresh tick;
//! the session methods below gather its inputs and apply its outcome.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{SessionEvent, WalletSession};
use crate::core::result_ext::ResultExt;
use crate::engine::{ConnectionStatus, Height};

/// Local height must be within this many blocks of the chain to count as synced.
pub const BLOCK_WINDOW: Height = 1000;

/// Externally observable connection/synchronization phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    NotConnected,
    Connecting,
    StartingSync,
    /// Scanning; carries the engine's latest reported block.
    Syncing(Height),
    Synced,
    Failed(String),
}

impl SyncStatus {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncStatus::Synced)
    }
}

/// Inputs of one refresh tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub current_height: Height,
    pub chain_height: Height,
    pub is_recovery: bool,
    pub connected: bool,
}

/// What one refresh tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncResolution {
    /// Emit `Synced`.
    pub synced: bool,
    /// Recovery scanning reached the chain tip; persist `is_recovery = false`.
    pub recovery_finished: bool,
    /// Recovery is still running; save the wallet.
    pub autosave: bool,
}

/// Decide the outcome of a refresh tick.
///
/// Only ever reports the positive `Synced` signal. A zero on either height
/// means there is not enough data to judge, and nothing happens at all.
pub fn resolve_sync(snapshot: SyncSnapshot, window: Height) -> SyncResolution {
    let SyncSnapshot { current_height, chain_height, is_recovery, connected } = snapshot;
    let mut resolution = SyncResolution::default();

    if current_height == 0 || chain_height == 0 {
        return resolution;
    }

    let caught_up = chain_height >= current_height && chain_height - current_height < window;
    if caught_up {
        if current_height == chain_height && is_recovery {
            resolution.recovery_finished = true;
            resolution.synced = true;
        } else if !is_recovery && connected {
            resolution.synced = true;
        }
    }

    resolution.autosave = is_recovery && !resolution.recovery_finished;
    resolution
}

impl WalletSession {
    /// Engine refresh tick. Errors are logged, never propagated.
    pub(crate) async fn on_refreshed(&self) {
        let session = self.clone();
        let chain_height = match tokio::task::spawn_blocking(move || session.blockchain_height()).await {
            Ok(result) => result,
            Err(e) => {
                warn!(wallet = %self.name(), "chain height task failed: {}", e);
                return;
            }
        };
        let Some(chain_height) = chain_height.ok_or_log("chain height refresh") else {
            return;
        };

        let Ok(engine) = self.engine() else {
            return;
        };
        let snapshot = SyncSnapshot {
            current_height: self.current_height(),
            chain_height,
            is_recovery: self.shared.config.read().is_recovery,
            connected: engine.connection_status() == ConnectionStatus::Connected,
        };
        let resolution = resolve_sync(snapshot, self.shared.block_window);
        debug!(wallet = %self.name(), ?snapshot, ?resolution, "refresh tick");

        if resolution.recovery_finished {
            self.finish_recovery().await;
        }
        if resolution.synced {
            self.set_sync_status(SyncStatus::Synced);
        }
        if resolution.autosave {
            self.save().await.ok_or_log("recovery autosave");
        }
    }

    /// New block scanned by the engine.
    pub(crate) fn on_new_block(&self, height: Height) {
        self.shared.publish(SessionEvent::NewBlock(height));

        let chain_height = *self.shared.chain_height.lock().peek();
        if chain_height > height && chain_height - height >= self.shared.block_window {
            self.set_sync_status(SyncStatus::Syncing(height));
        }
    }

    async fn finish_recovery(&self) {
        let updated = {
            let mut config = self.shared.config.write();
            *config = config.with_recovery(false);
            config.clone()
        };
        if let Ok(engine) = self.engine() {
            engine.set_is_recovery(false);
        }

        let persisted = self.shared.executor.run(move || updated.save()).await;
        if persisted.and_then(|r| r).ok_or_log("persist wallet config").is_some() {
            info!(wallet = %self.name(), "✅ recovery scan finished");
        }
    }
}
