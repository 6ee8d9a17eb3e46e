//! Wallet session coordinator
//!
//! Owns one engine at a time, caches the daemon chain height, derives the sync
//! status from engine callbacks and keeps save/close/rescan from overlapping.
//!
//! ## Module Structure
//! - `state` - session state machine (idle, saving, closing, rescanning, closed)
//! - `lifecycle` - connect, start_update, save, close, password change
//! - `sync_status` - sync status resolution on refresh ticks
//! - `rescan` - engine replacement from seed at a new restore height
//! - `account` - account/address selection and balances
//! - `transactions` - send and transaction history
//! - `events` - engine event dispatch and session notifications

pub mod account;
pub mod events;
pub mod lifecycle;
pub mod rescan;
pub mod state;
pub mod sync_status;
pub mod transactions;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::core::{errors::WalletError, SessionSettings, WalletConfig};
use crate::engine::{EngineEventSender, Height, WalletEngine, WalletGateway};
use crate::tools::{EventBus, SerialExecutor, TimedCache};

pub use events::SessionEvent;
pub use rescan::RescanRequest;
pub use state::SessionState;
pub use sync_status::{resolve_sync, SyncResolution, SyncSnapshot, SyncStatus};
pub use transactions::TransactionHistory;

const EVENT_CAPACITY: usize = 256;

/// Handle to a wallet session. Clones share the same session.
#[derive(Clone)]
pub struct WalletSession {
    shared: Arc<SessionShared>,
}

pub(crate) struct SessionShared {
    id: Uuid,
    name: String,
    engine: RwLock<Option<Arc<dyn WalletEngine>>>,
    gateway: Arc<dyn WalletGateway>,
    executor: SerialExecutor,
    config: RwLock<WalletConfig>,
    block_window: Height,
    account_index: AtomicU32,
    address_index: AtomicU32,
    state: state::StateCell,
    chain_height: Mutex<TimedCache<Height>>,
    history: Mutex<Option<Arc<TransactionHistory>>>,
    sync_status: RwLock<SyncStatus>,
    events: EventBus<SessionEvent>,
    listener: EngineEventSender,
}

impl SessionShared {
    fn engine(&self) -> Result<Arc<dyn WalletEngine>, WalletError> {
        self.engine
            .read()
            .clone()
            .ok_or_else(|| WalletError::EngineUnavailable(format!("wallet '{}' has no open engine", self.name)))
    }

    /// Bind the chain-height cache to `engine`; the next read queries it.
    fn attach_chain_height(&self, engine: Arc<dyn WalletEngine>) {
        let mut cache = self.chain_height.lock();
        cache.set_refresh(move || engine.daemon_blockchain_height());
        cache.invalidate();
    }

    fn publish(&self, event: SessionEvent) {
        self.events.publish(event);
    }

    fn set_sync_status(&self, status: SyncStatus) {
        *self.sync_status.write() = status.clone();
        self.publish(SessionEvent::StatusChanged(status));
    }
}

impl WalletSession {
    /// Start a session around an opened engine.
    ///
    /// Must be called inside a tokio runtime: the engine event dispatcher is
    /// spawned onto it.
    pub fn new(
        engine: Arc<dyn WalletEngine>,
        gateway: Arc<dyn WalletGateway>,
        config: WalletConfig,
        settings: &SessionSettings,
        executor: SerialExecutor,
    ) -> Result<Self, WalletError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            WalletError::AsyncError("wallet session requires a tokio runtime".to_string())
        })?;

        let (listener, receiver) = EngineEventSender::channel();
        let chain_height = TimedCache::new(0, settings.chain_height_ttl())
            .with_force_refresh(|height: &Height| *height == 0);

        let name = engine.name();
        let shared = Arc::new(SessionShared {
            id: Uuid::new_v4(),
            name: name.clone(),
            engine: RwLock::new(Some(engine.clone())),
            gateway,
            executor,
            config: RwLock::new(config),
            block_window: settings.block_window,
            account_index: AtomicU32::new(0),
            address_index: AtomicU32::new(0),
            state: state::StateCell::new(),
            chain_height: Mutex::new(chain_height),
            history: Mutex::new(None),
            sync_status: RwLock::new(SyncStatus::NotConnected),
            events: EventBus::new(EVENT_CAPACITY),
            listener: listener.clone(),
        });

        shared.attach_chain_height(engine.clone());
        engine.set_listener(Some(listener));
        runtime.spawn(events::dispatch(Arc::downgrade(&shared), receiver));

        info!(wallet = %name, session = %shared.id, "wallet session opened");
        Ok(Self { shared })
    }

    /// Start a session, reading the persisted wallet config through the gateway.
    pub fn load(
        engine: Arc<dyn WalletEngine>,
        gateway: Arc<dyn WalletGateway>,
        settings: &SessionSettings,
        executor: SerialExecutor,
    ) -> Result<Self, WalletError> {
        let path = gateway.config_path_for(&engine.name());
        let config = WalletConfig::load(&path)?;
        Self::new(engine, gateway, config, settings, executor)
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    pub fn config(&self) -> WalletConfig {
        self.shared.config.read().clone()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.shared.sync_status.read().clone()
    }

    pub fn account_index(&self) -> u32 {
        self.shared.account_index.load(Ordering::SeqCst)
    }

    pub fn address_index(&self) -> u32 {
        self.shared.address_index.load(Ordering::SeqCst)
    }

    /// Register interest in session notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Whether the session currently owns an engine.
    pub fn has_engine(&self) -> bool {
        self.shared.engine.read().is_some()
    }

    /// Height the wallet has scanned to.
    ///
    /// While recovering, the engine reports 0 or 1 until its first refresh;
    /// the restore height stands in for those placeholders.
    pub fn current_height(&self) -> Height {
        let height = match self.shared.engine() {
            Ok(engine) => engine.current_height(),
            Err(_) => return 0,
        };
        let config = self.shared.config.read();
        if config.is_recovery && height <= 1 {
            config.restore_height
        } else {
            height
        }
    }

    /// Daemon chain height, cached for the configured TTL. A cached zero is
    /// never trusted and is re-read on every call.
    pub fn blockchain_height(&self) -> Result<Height, WalletError> {
        self.shared.chain_height.lock().value()
    }

    pub(crate) fn engine(&self) -> Result<Arc<dyn WalletEngine>, WalletError> {
        self.shared.engine()
    }

    pub(crate) fn ensure_not_blocking(&self, operation: &str) -> Result<(), WalletError> {
        let state = self.state();
        if state.is_blocking() {
            return Err(WalletError::SessionBlocked(format!(
                "{} rejected while session is {:?}",
                operation, state
            )));
        }
        Ok(())
    }

    pub(crate) fn set_sync_status(&self, status: SyncStatus) {
        self.shared.set_sync_status(status);
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}
