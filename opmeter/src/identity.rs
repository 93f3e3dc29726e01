//! Allocates monotonic per-`(category, operation)` sequence positions.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static COUNTERS: Lazy<Mutex<HashMap<String, Arc<AtomicU64>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Returns the next position for the given `(category, operation)` pair.
///
/// The first call for a given key yields `1`. Concurrent callers observe
/// distinct, strictly increasing values per key; the counter wraps from
/// `u64::MAX` back to `1` (the value `0` is never observed).
pub(crate) fn next_position(category: &str, operation: Option<&str>) -> u64 {
    let key = match operation {
        Some(op) => format!("{category}/{op}"),
        None => category.to_string(),
    };

    // Lock is only held long enough to find-or-insert the per-key atomic;
    // the increment itself happens lock-free.
    let counter = {
        let mut counters = COUNTERS.lock();
        Arc::clone(
            counters
                .entry(key)
                .or_insert_with(|| Arc::new(AtomicU64::new(0))),
        )
    };

    loop {
        let current = counter.load(Ordering::Relaxed);
        let next = if current == u64::MAX { 1 } else { current + 1 };

        if counter
            .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            return next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_yields_one() {
        let key = format!("test_cat_{}", uuid::Uuid::new_v4());
        assert_eq!(next_position(&key, None), 1);
        assert_eq!(next_position(&key, None), 2);
        assert_eq!(next_position(&key, None), 3);
    }

    #[test]
    fn category_and_operation_are_independent_keys() {
        let key = format!("test_cat_{}", uuid::Uuid::new_v4());
        assert_eq!(next_position(&key, None), 1);
        assert_eq!(next_position(&key, Some("op")), 1);
        assert_eq!(next_position(&key, None), 2);
        assert_eq!(next_position(&key, Some("op")), 2);
    }

    #[test]
    fn wraps_from_max_to_one() {
        let key = format!("test_cat_{}", uuid::Uuid::new_v4());
        {
            let mut counters = COUNTERS.lock();
            counters.insert(key.clone(), Arc::new(AtomicU64::new(u64::MAX)));
        }
        assert_eq!(next_position(&key, None), 1);
        assert_eq!(next_position(&key, None), 2);
    }

    #[test]
    fn concurrent_callers_observe_distinct_increasing_values() {
        let key = format!("test_cat_{}", uuid::Uuid::new_v4());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let key = key.clone();
                std::thread::spawn(move || {
                    (0..100).map(|_| next_position(&key, None)).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        let expected: Vec<u64> = (1..=800).collect();
        assert_eq!(all, expected);
    }
}
