//! Sending and transaction history

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::WalletSession;
use crate::core::amount::parse_amount;
use crate::core::errors::{TransactionError, WalletError};
use crate::engine::{PendingTransaction, TransactionInfo, TransactionPriority, WalletEngine};

/// Snapshot of an engine's transactions, reloaded on the first read after
/// it was marked stale.
///
/// Bound to the engine it was built from. The session drops its handle when
/// that engine is replaced or released.
pub struct TransactionHistory {
    engine: Arc<dyn WalletEngine>,
    entries: RwLock<Vec<TransactionInfo>>,
    stale: AtomicBool,
}

impl TransactionHistory {
    fn new(engine: Arc<dyn WalletEngine>) -> Self {
        let entries = engine.transactions();
        Self { engine, entries: RwLock::new(entries), stale: AtomicBool::new(false) }
    }

    pub fn entries(&self) -> Vec<TransactionInfo> {
        if self.stale.swap(false, Ordering::SeqCst) {
            *self.entries.write() = self.engine.transactions();
        }
        self.entries.read().clone()
    }

    pub fn for_account(&self, account: u32) -> Vec<TransactionInfo> {
        self.entries().into_iter().filter(|tx| tx.account == account).collect()
    }

    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TransactionHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHistory")
            .field("entries", &self.entries.read().len())
            .field("stale", &self.is_stale())
            .finish()
    }
}

impl WalletSession {
    /// Build a transaction from the selected account.
    ///
    /// `amount` is a decimal XMR string; `None` sweeps the unlocked balance.
    /// Engine failures are reinterpreted as [`TransactionError`]s where the
    /// requested amount and balance allow it, otherwise returned unchanged.
    pub fn send(
        &self,
        amount: Option<&str>,
        address: &str,
        payment_id: Option<&str>,
        priority: TransactionPriority,
    ) -> Result<Box<dyn PendingTransaction>, WalletError> {
        self.ensure_not_blocking("send")?;
        let engine = self.engine()?;
        let account = self.account_index();
        let requested = amount.map(parse_amount).transpose()?;

        match engine.create_transaction(address, payment_id, amount, priority, account) {
            Ok(pending) => {
                info!(
                    wallet = %self.name(),
                    tx = %pending.id(),
                    amount = pending.amount(),
                    fee = pending.fee(),
                    "transaction created"
                );
                Ok(pending)
            }
            Err(err) => {
                let available = engine.unlocked_balance(account);
                match TransactionError::interpret(&err, requested, available, address) {
                    Some(structured) => {
                        debug!(wallet = %self.name(), raw = %err, "engine error reinterpreted");
                        Err(structured.into())
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Shared history handle, built on first access after the engine changed.
    pub fn transaction_history(&self) -> Result<Arc<TransactionHistory>, WalletError> {
        let mut slot = self.shared.history.lock();
        if let Some(history) = slot.as_ref() {
            return Ok(history.clone());
        }
        let history = Arc::new(TransactionHistory::new(self.engine()?));
        *slot = Some(history.clone());
        Ok(history)
    }

    pub fn transaction_key(&self, tx_id: &str) -> Result<Option<String>, WalletError> {
        Ok(self.engine()?.transaction_key(tx_id))
    }

    pub fn integrated_address(&self, payment_id: &str) -> Result<String, WalletError> {
        Ok(self.engine()?.integrated_address(payment_id))
    }
}
