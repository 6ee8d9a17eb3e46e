//! Interfaces consumed from the native wallet library
//!
//! The engine owns keys, balances and chain scanning; the session only drives it
//! through [`WalletEngine`] and receives its callbacks through
//! [`EngineEventSender`].

pub mod simulated;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::errors::WalletError;

pub use simulated::{SimulatedEngine, SimulatedGateway};

/// Block height.
pub type Height = u64;

/// Connection state reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    WrongVersion,
}

/// Fee priority passed through to transaction construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionPriority {
    Slow,
    #[default]
    Default,
    Fast,
    Fastest,
}

impl TransactionPriority {
    /// Numeric priority understood by the engine.
    pub fn raw(self) -> u32 {
        match self {
            TransactionPriority::Slow => 1,
            TransactionPriority::Default => 2,
            TransactionPriority::Fast => 3,
            TransactionPriority::Fastest => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionDirection {
    Incoming,
    Outgoing,
}

/// One entry of the engine's transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub id: String,
    pub direction: TransactionDirection,
    pub amount: u64,
    pub fee: u64,
    pub height: Height,
    pub account: u32,
    pub is_pending: bool,
}

/// Callbacks raised by the engine on its own thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    NewBlock(Height),
    Refreshed,
    Updated,
    MoneyReceived { tx_id: String, amount: u64 },
    MoneySpent { tx_id: String, amount: u64 },
    UnconfirmedMoneyReceived { tx_id: String, amount: u64 },
}

/// Handle given to an engine so it can report events from any thread.
///
/// Sends never block; events are queued for the session's dispatcher.
#[derive(Debug, Clone)]
pub struct EngineEventSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineEventSender {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("engine event dropped: session dispatcher has shut down");
        }
    }

    pub fn new_block(&self, height: Height) {
        self.send(EngineEvent::NewBlock(height));
    }

    pub fn refreshed(&self) {
        self.send(EngineEvent::Refreshed);
    }

    pub fn updated(&self) {
        self.send(EngineEvent::Updated);
    }

    pub fn money_received(&self, tx_id: &str, amount: u64) {
        self.send(EngineEvent::MoneyReceived { tx_id: tx_id.to_string(), amount });
    }

    pub fn money_spent(&self, tx_id: &str, amount: u64) {
        self.send(EngineEvent::MoneySpent { tx_id: tx_id.to_string(), amount });
    }

    pub fn unconfirmed_money_received(&self, tx_id: &str, amount: u64) {
        self.send(EngineEvent::UnconfirmedMoneyReceived { tx_id: tx_id.to_string(), amount });
    }
}

/// A constructed but not yet broadcast transaction.
pub trait PendingTransaction: Send + Sync {
    fn id(&self) -> String;
    fn amount(&self) -> u64;
    fn fee(&self) -> u64;
    /// Broadcast the transaction through the connected node.
    fn commit(&self) -> Result<(), WalletError>;
}

/// The native wallet library instance.
///
/// Calls are blocking. Implementations must invoke the registered listener
/// from one thread at a time.
pub trait WalletEngine: Send + Sync {
    fn name(&self) -> String;
    fn balance(&self, account: u32) -> u64;
    fn unlocked_balance(&self, account: u32) -> u64;
    fn address(&self, account: u32, address_index: u32) -> String;
    fn seed(&self) -> String;
    fn connection_status(&self) -> ConnectionStatus;

    /// Height the engine has scanned up to. 0 and 1 are bootstrap placeholders.
    fn current_height(&self) -> Height;

    /// Chain height as reported by the connected daemon.
    fn daemon_blockchain_height(&self) -> Result<Height, WalletError>;

    fn set_daemon_address(&self, uri: &str, login: Option<&str>, password: Option<&str>);
    fn connect_to_daemon(&self) -> Result<(), WalletError>;
    fn save(&self) -> Result<(), WalletError>;
    fn close(&self);
    fn clear(&self);
    fn start_refresh_async(&self);

    /// `amount` is a decimal XMR string; `None` sweeps the account.
    fn create_transaction(
        &self,
        address: &str,
        payment_id: Option<&str>,
        amount: Option<&str>,
        priority: TransactionPriority,
        account: u32,
    ) -> Result<Box<dyn PendingTransaction>, WalletError>;

    fn set_is_recovery(&self, is_recovery: bool);
    fn set_password(&self, password: &str) -> Result<(), WalletError>;
    fn transaction_key(&self, tx_id: &str) -> Option<String>;
    fn integrated_address(&self, payment_id: &str) -> String;
    fn transactions(&self) -> Vec<TransactionInfo>;

    /// Register (or with `None`, detach) the event listener.
    fn set_listener(&self, listener: Option<EngineEventSender>);
}

/// Wallet file management used when an engine has to be rebuilt from seed.
pub trait WalletGateway: Send + Sync {
    /// Delete every persisted file of the named wallet.
    fn remove(&self, name: &str) -> Result<(), WalletError>;
    fn path_for(&self, name: &str) -> PathBuf;
    fn recover_engine(
        &self,
        path: &Path,
        mnemonic: &str,
        password: &str,
        restore_height: Height,
    ) -> Result<Arc<dyn WalletEngine>, WalletError>;
    fn config_path_for(&self, name: &str) -> PathBuf;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_mapping() {
        assert_eq!(TransactionPriority::default(), TransactionPriority::Default);
        assert_eq!(TransactionPriority::Slow.raw(), 1);
        assert_eq!(TransactionPriority::Fastest.raw(), 4);
    }

    #[tokio::test]
    async fn test_event_sender_delivers_in_order() {
        let (sender, mut rx) = EngineEventSender::channel();
        let from_engine_thread = sender.clone();
        std::thread::spawn(move || {
            from_engine_thread.new_block(10);
            from_engine_thread.refreshed();
        })
        .join()
        .unwrap();

        assert_eq!(rx.recv().await, Some(EngineEvent::NewBlock(10)));
        assert_eq!(rx.recv().await, Some(EngineEvent::Refreshed));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (sender, rx) = EngineEventSender::channel();
        drop(rx);
        sender.money_received("tx", 5);
    }
}
