use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use monero_wallet_session::tools::TimedCache;
use proptest::prelude::*;

fn cache(origin: u64, ttl: Duration, next: u64) -> (TimedCache<u64>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let cache = TimedCache::new(origin, ttl)
        .with_refresh(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(next)
        })
        .with_force_refresh(|v: &u64| *v == 0);
    (cache, calls)
}

proptest! {
    #[test]
    fn prop_reads_within_ttl_never_refresh(origin in 1u64..u64::MAX, next: u64, reads in 1usize..50) {
        let (mut cache, calls) = cache(origin, Duration::from_secs(60), next);
        for _ in 0..reads {
            prop_assert_eq!(cache.value().unwrap(), origin);
        }
        prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn prop_forced_value_refreshes_every_read(reads in 1usize..50) {
        let (mut cache, calls) = cache(0, Duration::from_secs(60), 0);
        for _ in 0..reads {
            prop_assert_eq!(cache.value().unwrap(), 0);
        }
        prop_assert_eq!(calls.load(Ordering::SeqCst), reads);
    }
}

#[test]
fn test_refresh_at_most_once_per_window() {
    let (mut cache, calls) = cache(5, Duration::from_millis(30), 9);
    std::thread::sleep(Duration::from_millis(50));

    for _ in 0..20 {
        assert_eq!(cache.value().unwrap(), 9);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_forced_zero_stops_once_nonzero() {
    let (mut cache, calls) = cache(0, Duration::from_secs(60), 12);
    assert_eq!(cache.value().unwrap(), 12);
    assert_eq!(cache.value().unwrap(), 12);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
