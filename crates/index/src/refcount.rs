//! Reference-counted key membership.
//!
//! Used to deduplicate many-to-one projections: a derived key is present for
//! as long as at least one contributor holds a reference to it.

use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::hash::Hash;
use core::sync::atomic::{AtomicUsize, Ordering};
use cosync_core::{Error, Result};
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;

/// A key to reference-count map.
///
/// A key is present while its count is non-zero and removed as soon as the
/// count reaches zero. By default counts never go below zero: a decrement that
/// would underflow fails with `Error::NegativeReferenceCount` and leaves the
/// map unchanged.
#[derive(Clone, Debug)]
pub struct RefCountMap<K> {
    counts: HashMap<K, i64>,
    allow_negative: bool,
}

impl<K: Eq + Hash> Default for RefCountMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> RefCountMap<K> {
    /// Creates an empty map that rejects negative counts.
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            allow_negative: false,
        }
    }

    /// Creates an empty map that keeps negative counts as present keys.
    pub fn allow_negative() -> Self {
        Self {
            counts: HashMap::new(),
            allow_negative: true,
        }
    }

    /// Returns true if negative counts are allowed.
    #[inline]
    pub fn allows_negative(&self) -> bool {
        self.allow_negative
    }

    /// Adds `delta` to the count of `key`.
    ///
    /// Returns true when the key came into existence or was removed.
    pub fn increment_by(&mut self, key: K, delta: i64) -> Result<bool> {
        if delta == 0 {
            return Ok(false);
        }
        match self.counts.entry(key) {
            Entry::Occupied(mut entry) => {
                let next = *entry.get() + delta;
                if next < 0 && !self.allow_negative {
                    return Err(Error::negative_reference_count(next));
                }
                if next == 0 {
                    entry.remove();
                    Ok(true)
                } else {
                    *entry.get_mut() = next;
                    Ok(false)
                }
            }
            Entry::Vacant(entry) => {
                if delta < 0 && !self.allow_negative {
                    return Err(Error::negative_reference_count(delta));
                }
                entry.insert(delta);
                Ok(true)
            }
        }
    }

    /// Adds one reference. Returns true when the key came into or went out of
    /// existence.
    pub fn increment(&mut self, key: K) -> bool {
        // A positive delta cannot underflow.
        matches!(self.increment_by(key, 1), Ok(true))
    }

    /// Drops one reference. Returns true when the key was removed (or, with
    /// negative counts allowed, came into existence).
    pub fn decrement(&mut self, key: K) -> Result<bool> {
        self.increment_by(key, -1)
    }

    /// Returns the current count of `key`, zero if absent.
    #[inline]
    pub fn get(&self, key: &K) -> i64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Returns true if `key` is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.counts.contains_key(key)
    }

    /// Returns the number of present keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if no key is present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterates over the present keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.counts.keys()
    }

    /// Iterates over `(key, count)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, i64)> {
        self.counts.iter().map(|(key, count)| (key, *count))
    }

    /// Removes `key` regardless of its count, returning the count it had.
    pub fn remove(&mut self, key: &K) -> Option<i64> {
        self.counts.remove(key)
    }

    /// Removes all keys.
    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// A `RefCountMap` that can be shared between threads.
///
/// Every operation, reads included, runs under a spin-wait guard: an operation
/// counter is moved from 0 to 1 with a compare-and-swap before the map is
/// touched and released afterwards. Operations are short and never call back
/// into user code while holding the guard.
pub struct SyncRefCountMap<K> {
    map: UnsafeCell<RefCountMap<K>>,
    op_count: AtomicUsize,
}

// SAFETY: all access to `map` goes through `with_map`, which admits one
// operation at a time.
unsafe impl<K: Send> Sync for SyncRefCountMap<K> {}

impl<K: Eq + Hash> Default for SyncRefCountMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> SyncRefCountMap<K> {
    /// Creates an empty map that rejects negative counts.
    pub fn new() -> Self {
        Self::from_map(RefCountMap::new())
    }

    /// Creates an empty map that keeps negative counts.
    pub fn allow_negative() -> Self {
        Self::from_map(RefCountMap::allow_negative())
    }

    fn from_map(map: RefCountMap<K>) -> Self {
        Self {
            map: UnsafeCell::new(map),
            op_count: AtomicUsize::new(0),
        }
    }

    fn with_map<R>(&self, op: impl FnOnce(&mut RefCountMap<K>) -> R) -> R {
        let _guard = self.enter();
        // SAFETY: the guard grants exclusive access until dropped.
        op(unsafe { &mut *self.map.get() })
    }

    fn enter(&self) -> OpGuard<'_> {
        loop {
            while self.op_count.load(Ordering::Relaxed) > 0 {
                core::hint::spin_loop();
            }
            if self
                .op_count
                .compare_exchange_weak(0, 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return OpGuard {
                    op_count: &self.op_count,
                };
            }
        }
    }

    /// See `RefCountMap::increment_by`.
    pub fn increment_by(&self, key: K, delta: i64) -> Result<bool> {
        self.with_map(|map| map.increment_by(key, delta))
    }

    /// See `RefCountMap::increment`.
    pub fn increment(&self, key: K) -> bool {
        self.with_map(|map| map.increment(key))
    }

    /// See `RefCountMap::decrement`.
    pub fn decrement(&self, key: K) -> Result<bool> {
        self.with_map(|map| map.decrement(key))
    }

    /// Returns the current count of `key`, zero if absent.
    pub fn get(&self, key: &K) -> i64 {
        self.with_map(|map| map.get(key))
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.with_map(|map| map.contains_key(key))
    }

    /// Returns the number of present keys.
    pub fn len(&self) -> usize {
        self.with_map(|map| map.len())
    }

    /// Returns true if no key is present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes `key` regardless of its count.
    pub fn remove(&self, key: &K) -> Option<i64> {
        self.with_map(|map| map.remove(key))
    }

    /// Removes all keys.
    pub fn clear(&self) {
        self.with_map(|map| map.clear())
    }

    /// Returns a copy of the `(key, count)` pairs.
    pub fn snapshot(&self) -> Vec<(K, i64)>
    where
        K: Clone,
    {
        self.with_map(|map| map.iter().map(|(key, count)| (key.clone(), count)).collect())
    }

    /// Consumes the wrapper and returns the inner map.
    pub fn into_inner(self) -> RefCountMap<K> {
        self.map.into_inner()
    }
}

struct OpGuard<'a> {
    op_count: &'a AtomicUsize,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.op_count.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_reports_membership_changes() {
        let mut map = RefCountMap::new();
        assert!(map.increment("k"));
        assert!(!map.increment("k"));
        assert!(!map.increment("k"));
        assert_eq!(map.get(&"k"), 3);

        assert_eq!(map.decrement("k"), Ok(false));
        assert_eq!(map.decrement("k"), Ok(false));
        assert!(map.contains_key(&"k"));
        assert_eq!(map.decrement("k"), Ok(true));
        assert!(!map.contains_key(&"k"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_underflow_is_rejected() {
        let mut map = RefCountMap::new();
        assert_eq!(map.decrement(1), Err(Error::negative_reference_count(-1)));
        assert!(map.is_empty());

        map.increment(1);
        assert_eq!(map.increment_by(1, -2), Err(Error::negative_reference_count(-1)));
        assert_eq!(map.get(&1), 1);
    }

    #[test]
    fn test_allow_negative() {
        let mut map = RefCountMap::allow_negative();
        assert!(map.allows_negative());
        assert_eq!(map.decrement('a'), Ok(true));
        assert_eq!(map.get(&'a'), -1);
        assert!(map.contains_key(&'a'));
        // Back to zero removes the key
        assert!(map.increment('a'));
        assert!(!map.contains_key(&'a'));
    }

    #[test]
    fn test_increment_by() {
        let mut map = RefCountMap::new();
        assert_eq!(map.increment_by(7, 0), Ok(false));
        assert!(map.is_empty());
        assert_eq!(map.increment_by(7, 5), Ok(true));
        assert_eq!(map.increment_by(7, -3), Ok(false));
        assert_eq!(map.increment_by(7, -2), Ok(true));
        assert!(map.is_empty());
    }

    #[test]
    fn test_fan_in_three_contributors() {
        let mut map = RefCountMap::new();
        let mut appeared = 0;
        for _ in 0..3 {
            if map.increment("shared") {
                appeared += 1;
            }
        }
        assert_eq!(appeared, 1);
        assert_eq!(map.len(), 1);

        assert_eq!(map.decrement("shared"), Ok(false));
        assert_eq!(map.decrement("shared"), Ok(false));
        assert!(map.contains_key(&"shared"));
        assert_eq!(map.decrement("shared"), Ok(true));
        assert!(map.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut map = RefCountMap::new();
        map.increment_by(1, 4).unwrap();
        map.increment(2);
        assert_eq!(map.remove(&1), Some(4));
        assert_eq!(map.remove(&1), None);
        let mut keys: Vec<_> = map.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, alloc::vec![2]);
        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn test_sync_map_basic() {
        let map = SyncRefCountMap::new();
        assert!(map.increment(1u32));
        assert!(!map.increment(1u32));
        assert_eq!(map.get(&1), 2);
        assert_eq!(map.decrement(1), Ok(false));
        assert_eq!(map.decrement(1), Ok(true));
        assert!(map.is_empty());
        assert!(map.decrement(1).is_err());
    }

    #[test]
    fn test_sync_map_concurrent_increments() {
        use std::sync::Arc;
        use std::thread;

        let map = Arc::new(SyncRefCountMap::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let map = map.clone();
                thread::spawn(move || {
                    for key in 0..100u32 {
                        map.increment(key % 10);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(map.len(), 10);
        let mut snapshot = map.snapshot();
        snapshot.sort();
        assert!(snapshot.iter().all(|(_, count)| *count == 40));
    }
}
