pub mod amount;
pub mod config;
pub mod errors;
pub mod result_ext;

pub use config::{NodeConfig, SessionSettings, WalletConfig};
pub use errors::{TransactionError, WalletError};
