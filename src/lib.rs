#![allow(clippy::redundant_pattern_matching)]
#![allow(clippy::doc_lazy_continuation)]
#![allow(clippy::needless_return)]
// src/lib.rs
//! Monero wallet session coordination
//!
//! [`session::WalletSession`] owns one native wallet engine at a time, caches
//! the daemon chain height, derives a sync status from engine callbacks and
//! serializes save/close/rescan on a dedicated executor.

pub mod cli;
pub mod core;
pub mod engine;
pub mod session;
pub mod tools;

pub use crate::core::errors::{TransactionError, WalletError};
pub use crate::session::{SessionEvent, SessionState, SyncStatus, WalletSession};
