pub mod async_support;
pub mod timed_cache;

pub use async_support::{AsyncResult, EventBus, SerialExecutor};
pub use timed_cache::TimedCache;
