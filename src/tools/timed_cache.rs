//! Single-value cache with a time-to-live

use std::time::{Duration, Instant};

use crate::core::errors::WalletError;

pub type RefreshFn<T, E> = Box<dyn FnMut() -> Result<T, E> + Send>;
pub type ForceRefreshFn<T> = Box<dyn Fn(&T) -> bool + Send>;

/// Caches one value for `timeout`, re-reading it through `refresh` when stale.
///
/// Without a refresh function the cache never updates and keeps returning its
/// initial value. There is no internal locking: wrap it in a mutex when more
/// than one owner reads it.
pub struct TimedCache<T, E = WalletError> {
    origin: T,
    last_update: Option<Instant>,
    timeout: Duration,
    refresh: Option<RefreshFn<T, E>>,
    should_force_refresh: Option<ForceRefreshFn<T>>,
}

impl<T: Clone, E> TimedCache<T, E> {
    pub fn new(origin: T, timeout: Duration) -> Self {
        Self {
            origin,
            last_update: Some(Instant::now()),
            timeout,
            refresh: None,
            should_force_refresh: None,
        }
    }

    pub fn with_refresh(mut self, refresh: impl FnMut() -> Result<T, E> + Send + 'static) -> Self {
        self.set_refresh(refresh);
        self
    }

    /// Values matching `predicate` are refreshed on every read regardless of TTL.
    pub fn with_force_refresh(mut self, predicate: impl Fn(&T) -> bool + Send + 'static) -> Self {
        self.should_force_refresh = Some(Box::new(predicate));
        self
    }

    pub fn set_refresh(&mut self, refresh: impl FnMut() -> Result<T, E> + Send + 'static) {
        self.refresh = Some(Box::new(refresh));
    }

    /// Drop the refresh function; the cache falls back to returning its last value.
    pub fn clear_refresh(&mut self) {
        self.refresh = None;
    }

    pub fn has_refresh(&self) -> bool {
        self.refresh.is_some()
    }

    /// Current value, refreshed first when forced or expired.
    ///
    /// A failed refresh leaves the cached value and timestamp untouched.
    pub fn value(&mut self) -> Result<T, E> {
        let forced = self
            .should_force_refresh
            .as_ref()
            .map(|predicate| predicate(&self.origin))
            .unwrap_or(false);

        if forced || self.is_expired() {
            if let Some(refresh) = self.refresh.as_mut() {
                self.origin = refresh()?;
                self.last_update = Some(Instant::now());
            }
        }
        Ok(self.origin.clone())
    }

    /// Cached value without triggering a refresh.
    pub fn peek(&self) -> &T {
        &self.origin
    }

    pub fn is_expired(&self) -> bool {
        match self.last_update {
            Some(at) => at.elapsed() > self.timeout,
            None => true,
        }
    }

    /// Force the next `value()` to refresh.
    pub fn invalidate(&mut self) {
        self.last_update = None;
    }
}
