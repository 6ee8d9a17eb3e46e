//! Account and address selection

use std::sync::atomic::Ordering;

use tracing::debug;
use zeroize::Zeroizing;

use super::WalletSession;
use crate::core::errors::WalletError;

impl WalletSession {
    /// Select a subaddress of the current account. Notifies only on change.
    pub fn change_address(&self, index: u32) {
        if self.shared.address_index.swap(index, Ordering::SeqCst) == index {
            return;
        }
        debug!(wallet = %self.name(), index, "address changed");
        self.publish_address();
    }

    /// Select an account, resetting the address index to 0. Notifies only on change.
    pub fn change_account(&self, index: u32) {
        if self.shared.account_index.swap(index, Ordering::SeqCst) == index {
            return;
        }
        self.shared.address_index.store(0, Ordering::SeqCst);
        debug!(wallet = %self.name(), index, "account changed");
        self.publish_balance();
        self.publish_address();
    }

    pub fn balance(&self) -> Result<u64, WalletError> {
        Ok(self.engine()?.balance(self.account_index()))
    }

    pub fn unlocked_balance(&self) -> Result<u64, WalletError> {
        Ok(self.engine()?.unlocked_balance(self.account_index()))
    }

    /// Address for the selected account and subaddress.
    pub fn address(&self) -> Result<String, WalletError> {
        Ok(self.engine()?.address(self.account_index(), self.address_index()))
    }

    /// Mnemonic seed; wiped from memory when dropped.
    pub fn seed(&self) -> Result<Zeroizing<String>, WalletError> {
        Ok(Zeroizing::new(self.engine()?.seed()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::core::{SessionSettings, WalletConfig};
    use crate::engine::{SimulatedEngine, SimulatedGateway};
    use crate::session::{SessionEvent, WalletSession};
    use crate::tools::SerialExecutor;

    fn session(engine: &Arc<SimulatedEngine>) -> WalletSession {
        let dir = std::env::temp_dir();
        let config = WalletConfig::new(dir.join("account-test.config.json"), false, 0);
        WalletSession::new(
            engine.clone(),
            SimulatedGateway::new(dir),
            config,
            &SessionSettings::default(),
            SerialExecutor::new("account-test").unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_change_account_fires_balance_and_address() {
        let engine = SimulatedEngine::new("acc", "seed");
        engine.set_balance(1, 500, 400);
        let session = session(&engine);
        session.change_address(3);
        let mut events = session.subscribe();

        session.change_account(1);

        assert_eq!(session.address_index(), 0);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::BalanceChanged { balance: 500, unlocked_balance: 400 }
        );
        assert_eq!(events.recv().await.unwrap(), SessionEvent::AddressChanged("sim-acc-1-0".to_string()));
        assert_eq!(session.balance().unwrap(), 500);
        assert_eq!(session.unlocked_balance().unwrap(), 400);
    }

    #[tokio::test]
    async fn test_unchanged_indexes_are_silent() {
        let engine = SimulatedEngine::new("acc", "seed");
        let session = session(&engine);
        let mut events = session.subscribe();

        session.change_account(0);
        session.change_address(0);
        assert!(events.try_recv().is_err());

        session.change_address(2);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::AddressChanged("sim-acc-0-2".to_string()));
        assert_eq!(session.address().unwrap(), "sim-acc-0-2");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_seed_is_exposed_zeroizing() {
        let engine = SimulatedEngine::new("acc", "abandon ability able");
        let session = session(&engine);
        assert_eq!(session.seed().unwrap().as_str(), "abandon ability able");
    }
}
