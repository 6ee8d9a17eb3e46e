//! Engine event dispatch
//!
//! Engine callbacks arrive on the engine's thread as [`EngineEvent`]s and are
//! handled here one at a time on a session-owned task. Callers observe the
//! outcome through [`SessionEvent`]s.

use std::sync::Weak;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{SessionShared, SyncStatus, WalletSession};
use crate::engine::{EngineEvent, Height};

/// Notifications delivered to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    NewBlock(Height),
    BalanceChanged { balance: u64, unlocked_balance: u64 },
    StatusChanged(SyncStatus),
    AddressChanged(String),
}

/// Drain engine events until the channel closes or the session is dropped.
pub(crate) async fn dispatch(shared: Weak<SessionShared>, mut receiver: mpsc::UnboundedReceiver<EngineEvent>) {
    while let Some(event) = receiver.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        WalletSession { shared }.process_engine_event(event).await;
    }
    debug!("engine event dispatcher stopped");
}

impl WalletSession {
    /// Handle one engine event.
    ///
    /// Events that arrive while the session is closing or rescanning belong to
    /// an engine that is being released and are dropped.
    pub async fn process_engine_event(&self, event: EngineEvent) {
        let state = self.state();
        if state.is_blocking() {
            trace!(wallet = %self.name(), ?state, ?event, "engine event dropped");
            return;
        }

        match event {
            EngineEvent::NewBlock(height) => self.on_new_block(height),
            EngineEvent::Refreshed => self.on_refreshed().await,
            EngineEvent::Updated
            | EngineEvent::MoneyReceived { .. }
            | EngineEvent::MoneySpent { .. }
            | EngineEvent::UnconfirmedMoneyReceived { .. } => self.on_money_changed(),
        }
    }

    fn on_money_changed(&self) {
        if let Some(history) = self.shared.history.lock().as_ref() {
            history.mark_stale();
        }
        self.publish_balance();
    }

    pub(crate) fn publish_balance(&self) {
        let Ok(engine) = self.engine() else {
            return;
        };
        let account = self.account_index();
        self.shared.publish(SessionEvent::BalanceChanged {
            balance: engine.balance(account),
            unlocked_balance: engine.unlocked_balance(account),
        });
    }

    pub(crate) fn publish_address(&self) {
        let Ok(engine) = self.engine() else {
            return;
        };
        let address = engine.address(self.account_index(), self.address_index());
        self.shared.publish(SessionEvent::AddressChanged(address));
    }
}
