//! In-process engine and gateway
//!
//! Stand-ins for the native library used by the demo binary and the test
//! suite. Heights, balances and failures are set directly; events are raised
//! through the registered listener exactly as the native engine would.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use super::{
    ConnectionStatus, EngineEvent, EngineEventSender, Height, PendingTransaction,
    TransactionDirection, TransactionInfo, TransactionPriority, WalletEngine, WalletGateway,
};
use crate::core::amount::parse_amount;
use crate::core::errors::WalletError;

const SIMULATED_FEE: u64 = 30_000_000;

#[derive(Debug, Default)]
struct SimState {
    current_height: Height,
    daemon_height: Height,
    daemon_error: Option<String>,
    connection: Option<ConnectionStatus>,
    connect_error: Option<String>,
    node: Option<String>,
    balances: HashMap<u32, (u64, u64)>,
    is_recovery: bool,
    password: String,
    password_error: Option<String>,
    save_error: Option<String>,
    save_delay: Duration,
    close_delay: Duration,
    transaction_error: Option<String>,
    transactions: Vec<TransactionInfo>,
    tx_keys: HashMap<String, String>,
    path: Option<PathBuf>,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    name: &'a str,
    current_height: Height,
    is_recovery: bool,
    transactions: &'a [TransactionInfo],
}

/// Simulated native wallet.
pub struct SimulatedEngine {
    name: String,
    seed: String,
    state: Mutex<SimState>,
    listener: Mutex<Option<EngineEventSender>>,
    saves: AtomicUsize,
    closes: AtomicUsize,
    clears: AtomicUsize,
    refresh_requests: AtomicUsize,
    daemon_height_queries: AtomicUsize,
}

impl SimulatedEngine {
    pub fn new(name: &str, seed: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            seed: seed.to_string(),
            state: Mutex::new(SimState::default()),
            listener: Mutex::new(None),
            saves: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            refresh_requests: AtomicUsize::new(0),
            daemon_height_queries: AtomicUsize::new(0),
        })
    }

    /// Wallet file `save` writes its snapshot to.
    pub fn set_path(&self, path: impl Into<PathBuf>) {
        self.state.lock().path = Some(path.into());
    }

    pub fn set_heights(&self, current: Height, daemon: Height) {
        let mut state = self.state.lock();
        state.current_height = current;
        state.daemon_height = daemon;
    }

    pub fn set_current_height(&self, height: Height) {
        self.state.lock().current_height = height;
    }

    pub fn set_daemon_height(&self, height: Height) {
        self.state.lock().daemon_height = height;
    }

    pub fn fail_daemon_height(&self, message: Option<&str>) {
        self.state.lock().daemon_error = message.map(str::to_string);
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connection = Some(if connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        });
    }

    pub fn fail_connect(&self, message: Option<&str>) {
        self.state.lock().connect_error = message.map(str::to_string);
    }

    pub fn node(&self) -> Option<String> {
        self.state.lock().node.clone()
    }

    pub fn set_balance(&self, account: u32, balance: u64, unlocked: u64) {
        self.state.lock().balances.insert(account, (balance, unlocked));
    }

    pub fn fail_save(&self, message: Option<&str>) {
        self.state.lock().save_error = message.map(str::to_string);
    }

    /// Make every `save` block the calling thread for `delay`.
    pub fn set_save_delay(&self, delay: Duration) {
        self.state.lock().save_delay = delay;
    }

    pub fn set_close_delay(&self, delay: Duration) {
        self.state.lock().close_delay = delay;
    }

    pub fn fail_transactions(&self, message: Option<&str>) {
        self.state.lock().transaction_error = message.map(str::to_string);
    }

    pub fn fail_set_password(&self, message: Option<&str>) {
        self.state.lock().password_error = message.map(str::to_string);
    }

    pub fn password(&self) -> String {
        self.state.lock().password.clone()
    }

    pub fn is_recovery(&self) -> bool {
        self.state.lock().is_recovery
    }

    pub fn push_transaction(&self, info: TransactionInfo) {
        let mut state = self.state.lock();
        if info.direction == TransactionDirection::Outgoing {
            state.tx_keys.insert(info.id.clone(), format!("txkey-{}", info.id));
        }
        state.transactions.push(info);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn refresh_requests(&self) -> usize {
        self.refresh_requests.load(Ordering::SeqCst)
    }

    pub fn daemon_height_queries(&self) -> usize {
        self.daemon_height_queries.load(Ordering::SeqCst)
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Raise an event through the registered listener. Returns `false` when detached.
    pub fn emit(&self, event: EngineEvent) -> bool {
        match self.listener.lock().as_ref() {
            Some(listener) => {
                listener.send(event);
                true
            }
            None => false,
        }
    }

    /// Scan up to `height` and report it the way a background refresh does.
    pub fn advance_to(&self, height: Height) {
        self.set_current_height(height);
        self.emit(EngineEvent::NewBlock(height));
        self.emit(EngineEvent::Refreshed);
    }
}

impl WalletEngine for SimulatedEngine {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn balance(&self, account: u32) -> u64 {
        self.state.lock().balances.get(&account).map(|b| b.0).unwrap_or(0)
    }

    fn unlocked_balance(&self, account: u32) -> u64 {
        self.state.lock().balances.get(&account).map(|b| b.1).unwrap_or(0)
    }

    fn address(&self, account: u32, address_index: u32) -> String {
        format!("sim-{}-{}-{}", self.name, account, address_index)
    }

    fn seed(&self) -> String {
        self.seed.clone()
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.state.lock().connection.unwrap_or(ConnectionStatus::Disconnected)
    }

    fn current_height(&self) -> Height {
        self.state.lock().current_height
    }

    fn daemon_blockchain_height(&self) -> Result<Height, WalletError> {
        self.daemon_height_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        match &state.daemon_error {
            Some(message) => Err(WalletError::engine(message.clone())),
            None => Ok(state.daemon_height),
        }
    }

    fn set_daemon_address(&self, uri: &str, _login: Option<&str>, _password: Option<&str>) {
        self.state.lock().node = Some(uri.to_string());
    }

    fn connect_to_daemon(&self) -> Result<(), WalletError> {
        let mut state = self.state.lock();
        if let Some(message) = state.connect_error.clone() {
            state.connection = Some(ConnectionStatus::Disconnected);
            return Err(WalletError::engine(message));
        }
        if state.node.is_none() {
            return Err(WalletError::engine("no daemon address set"));
        }
        state.connection = Some(ConnectionStatus::Connected);
        Ok(())
    }

    fn save(&self) -> Result<(), WalletError> {
        let (delay, error, path) = {
            let state = self.state.lock();
            (state.save_delay, state.save_error.clone(), state.path.clone())
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = error {
            return Err(WalletError::engine(message));
        }
        if let Some(path) = path {
            let state = self.state.lock();
            let snapshot = Snapshot {
                name: &self.name,
                current_height: state.current_height,
                is_recovery: state.is_recovery,
                transactions: &state.transactions,
            };
            let body = serde_json::to_vec(&snapshot)?;
            fs::write(path, body)?;
        }
        Ok(())
    }

    fn close(&self) {
        let delay = self.state.lock().close_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let mut state = self.state.lock();
        state.connection = Some(ConnectionStatus::Disconnected);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn start_refresh_async(&self) {
        self.refresh_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn create_transaction(
        &self,
        address: &str,
        _payment_id: Option<&str>,
        amount: Option<&str>,
        priority: TransactionPriority,
        account: u32,
    ) -> Result<Box<dyn PendingTransaction>, WalletError> {
        if let Some(message) = self.state.lock().transaction_error.clone() {
            return Err(WalletError::engine(message));
        }
        let unlocked = self.unlocked_balance(account);
        let amount = match amount {
            Some(raw) => parse_amount(raw).map_err(|e| WalletError::engine(e.to_string()))?,
            None => unlocked.saturating_sub(SIMULATED_FEE),
        };
        let fee = SIMULATED_FEE * u64::from(priority.raw());
        if amount + fee > unlocked {
            return Err(WalletError::engine(format!(
                "not enough money to transfer to {}",
                address
            )));
        }
        Ok(Box::new(SimulatedPendingTransaction {
            id: Uuid::new_v4().simple().to_string(),
            amount,
            fee,
        }))
    }

    fn set_is_recovery(&self, is_recovery: bool) {
        self.state.lock().is_recovery = is_recovery;
    }

    fn set_password(&self, password: &str) -> Result<(), WalletError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.password_error {
            return Err(WalletError::engine(message.clone()));
        }
        state.password = password.to_string();
        Ok(())
    }

    fn transaction_key(&self, tx_id: &str) -> Option<String> {
        self.state.lock().tx_keys.get(tx_id).cloned()
    }

    fn integrated_address(&self, payment_id: &str) -> String {
        format!("{}-{}", self.address(0, 0), payment_id)
    }

    fn transactions(&self) -> Vec<TransactionInfo> {
        self.state.lock().transactions.clone()
    }

    fn set_listener(&self, listener: Option<EngineEventSender>) {
        *self.listener.lock() = listener;
    }
}

struct SimulatedPendingTransaction {
    id: String,
    amount: u64,
    fee: u64,
}

impl PendingTransaction for SimulatedPendingTransaction {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn amount(&self) -> u64 {
        self.amount
    }

    fn fee(&self) -> u64 {
        self.fee
    }

    fn commit(&self) -> Result<(), WalletError> {
        Ok(())
    }
}

/// Directory-backed gateway producing [`SimulatedEngine`]s.
pub struct SimulatedGateway {
    root: PathBuf,
    remove_error: Mutex<Option<String>>,
    recover_error: Mutex<Option<String>>,
    recovered: Mutex<Vec<Arc<SimulatedEngine>>>,
}

impl SimulatedGateway {
    pub fn new(root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            root: root.into(),
            remove_error: Mutex::new(None),
            recover_error: Mutex::new(None),
            recovered: Mutex::new(Vec::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh engine whose wallet file lives under the gateway root.
    pub fn create_engine(&self, name: &str, seed: &str) -> Result<Arc<SimulatedEngine>, WalletError> {
        fs::create_dir_all(&self.root)?;
        let engine = SimulatedEngine::new(name, seed);
        engine.set_path(self.path_for(name));
        fs::write(self.keys_path_for(name), seed)?;
        Ok(engine)
    }

    pub fn fail_remove(&self, message: Option<&str>) {
        *self.remove_error.lock() = message.map(str::to_string);
    }

    pub fn fail_recover(&self, message: Option<&str>) {
        *self.recover_error.lock() = message.map(str::to_string);
    }

    /// Most recent engine built by `recover_engine`.
    pub fn last_recovered(&self) -> Option<Arc<SimulatedEngine>> {
        self.recovered.lock().last().cloned()
    }

    pub fn keys_path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.keys", name))
    }
}

impl WalletGateway for SimulatedGateway {
    fn remove(&self, name: &str) -> Result<(), WalletError> {
        if let Some(message) = self.remove_error.lock().clone() {
            return Err(WalletError::StorageError(message));
        }
        for path in [self.path_for(name), self.keys_path_for(name)] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn recover_engine(
        &self,
        path: &Path,
        mnemonic: &str,
        password: &str,
        restore_height: Height,
    ) -> Result<Arc<dyn WalletEngine>, WalletError> {
        if let Some(message) = self.recover_error.lock().clone() {
            return Err(WalletError::engine(message));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| WalletError::ValidationError(format!("bad wallet path {}", path.display())))?;

        let engine = self.create_engine(name, mnemonic)?;
        engine.set_password(password)?;
        engine.set_is_recovery(true);
        // bootstrap placeholder until the first refresh
        engine.set_current_height(1);
        tracing::debug!(wallet = %name, restore_height, "simulated engine recovered from seed");
        self.recovered.lock().push(engine.clone());
        Ok(engine)
    }

    fn config_path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.config.json", name))
    }
}
