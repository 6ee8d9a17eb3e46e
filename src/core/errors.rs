use std::fmt;

use thiserror::Error;

/// Custom error type for wallet session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Errors raised by the native wallet engine, passed through untouched.
    EngineError(String),
    /// Persisted wallet config could not be loaded or written.
    ConfigError(String),
    /// Failure while removing files or recovering a new engine during rescan.
    RescanError(String),
    /// Structured transaction failure derived from an engine error.
    Transaction(TransactionError),
    /// Operation rejected because the session is closing, rescanning or closed.
    SessionBlocked(String),
    /// The session does not currently own an engine.
    EngineUnavailable(String),
    /// Storage-related errors.
    StorageError(String),
    /// Validation errors.
    ValidationError(String),
    /// Serialization/deserialization errors.
    SerializationError(String),
    /// Async operation errors (executor shut down, job panicked).
    AsyncError(String),
    /// Generic errors (legacy).
    Other(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::EngineError(msg) => write!(f, "Engine error: {}", msg),
            WalletError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            WalletError::RescanError(msg) => write!(f, "Rescan error: {}", msg),
            WalletError::Transaction(err) => write!(f, "Transaction error: {}", err),
            WalletError::SessionBlocked(msg) => write!(f, "Session blocked: {}", msg),
            WalletError::EngineUnavailable(msg) => write!(f, "Engine unavailable: {}", msg),
            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            WalletError::AsyncError(msg) => write!(f, "Async error: {}", msg),
            WalletError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WalletError::Transaction(err) => Some(err),
            _ => None,
        }
    }
}

impl WalletError {
    /// Shorthand for an opaque engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::EngineError(message.into())
    }

    /// Errors that indicate the on-disk wallet may be in an unexpected state.
    pub fn is_critical(&self) -> bool {
        matches!(self, WalletError::RescanError(_) | WalletError::ConfigError(_))
    }

    /// Errors worth retrying on the next tick or user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::SessionBlocked(_))
    }
}

impl From<TransactionError> for WalletError {
    fn from(err: TransactionError) -> Self {
        WalletError::Transaction(err)
    }
}

impl From<anyhow::Error> for WalletError {
    fn from(err: anyhow::Error) -> Self {
        WalletError::Other(err.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for WalletError {
    fn from(err: toml::de::Error) -> Self {
        WalletError::ConfigError(err.to_string())
    }
}

/// Structured reading of a failed transaction construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("amount {requested} is below the network minimum")]
    AmountBelowMinimum { requested: u64 },

    #[error("invalid destination address: {address}")]
    InvalidDestination { address: String },
}

impl TransactionError {
    /// Reinterpret a raw engine error using the requested amount and the
    /// account's unlocked balance. Returns `None` when nothing structured can
    /// be derived, in which case the caller surfaces the raw error.
    ///
    /// `requested` is `None` for sweep-all transactions.
    pub fn interpret(
        err: &WalletError,
        requested: Option<u64>,
        available: u64,
        address: &str,
    ) -> Option<Self> {
        let WalletError::EngineError(raw) = err else {
            return None;
        };
        let message = raw.to_lowercase();

        if message.contains("invalid destination") || message.contains("invalid address") {
            return Some(TransactionError::InvalidDestination { address: address.to_string() });
        }

        let insufficient_message =
            message.contains("not enough money") || message.contains("not enough unlocked");
        match requested {
            Some(requested) if insufficient_message || requested > available => {
                Some(TransactionError::InsufficientFunds { requested, available })
            }
            None if insufficient_message => {
                Some(TransactionError::InsufficientFunds { requested: available, available })
            }
            Some(requested)
                if requested == 0
                    || message.contains("too small")
                    || message.contains("below minimum") =>
            {
                Some(TransactionError::AmountBelowMinimum { requested })
            }
            _ => None,
        }
    }
}
