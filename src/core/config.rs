use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::WalletError;
use crate::engine::Height;

/// Per-wallet record persisted next to the wallet files.
///
/// Treated as an immutable value: changes go through [`WalletConfig::with_recovery`]
/// (or a fresh value) followed by [`WalletConfig::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub is_recovery: bool,
    pub created_at: DateTime<Utc>,
    pub persist_path: PathBuf,
    /// Height recovery scanning starts from.
    #[serde(default)]
    pub restore_height: Height,
}

impl WalletConfig {
    pub fn new(persist_path: impl Into<PathBuf>, is_recovery: bool, restore_height: Height) -> Self {
        Self {
            is_recovery,
            created_at: Utc::now(),
            persist_path: persist_path.into(),
            restore_height,
        }
    }

    /// Read a config previously written by [`WalletConfig::save`].
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            WalletError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config: WalletConfig = serde_json::from_str(&raw).map_err(|e| {
            WalletError::ConfigError(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.persist_path = path.to_path_buf();
        Ok(config)
    }

    /// Write the config to `persist_path` via a temp file and rename, so a crash
    /// mid-write leaves the previous version in place.
    pub fn save(&self) -> Result<(), WalletError> {
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| WalletError::ConfigError(format!("failed to encode config: {}", e)))?;

        if let Some(parent) = self.persist_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    WalletError::ConfigError(format!(
                        "failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let tmp = self.persist_path.with_extension("tmp");
        fs::write(&tmp, body)
            .and_then(|_| fs::rename(&tmp, &self.persist_path))
            .map_err(|e| {
                WalletError::ConfigError(format!(
                    "failed to write {}: {}",
                    self.persist_path.display(),
                    e
                ))
            })
    }

    pub fn with_recovery(&self, is_recovery: bool) -> Self {
        Self { is_recovery, ..self.clone() }
    }
}

/// Remote node the engine connects to.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeConfig {
    pub uri: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl NodeConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into(), login: None, password: None }
    }

    pub fn with_credentials(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("uri", &self.uri)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Application-level session settings, usually loaded from `session.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// TTL of the cached daemon chain height (seconds)
    #[serde(default = "SessionSettings::default_chain_height_ttl")]
    pub chain_height_ttl_secs: u64,

    /// A wallet this many blocks (or fewer) behind the chain counts as caught up
    #[serde(default = "SessionSettings::default_block_window")]
    pub block_window: Height,

    /// Thread name of the serial executor
    #[serde(default = "SessionSettings::default_executor_label")]
    pub executor_label: String,

    #[serde(default)]
    pub node: Option<NodeConfig>,
}

impl SessionSettings {
    fn default_chain_height_ttl() -> u64 { 30 }
    fn default_block_window() -> Height { 1000 }
    fn default_executor_label() -> String { "wallet-serial".to_string() }

    pub fn chain_height_ttl(&self) -> Duration {
        Duration::from_secs(self.chain_height_ttl_secs)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, WalletError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            WalletError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chain_height_ttl_secs: Self::default_chain_height_ttl(),
            block_window: Self::default_block_window(),
            executor_label: Self::default_executor_label(),
            node: None,
        }
    }
}
