//! Single-flight memoization.
//!
//! [`MemoCache`] is the coordination primitive behind both memo layers of
//! the engine: `descriptor → Aspect` and
//! `(descriptor, node, configuration) → ConfiguredAspect`. Concurrent
//! requesters for an equal key join one in-flight computation instead of
//! racing; there is no locking discipline beyond this per-key coordination,
//! and unrelated keys never serialize against each other.
//!
//! # Coordination
//!
//! Each key holds one of two states in a [`DashMap`]:
//!
//! ```text
//! Pending(notify)  one caller is computing; waiters park on the Notify
//! Ready(value)     the committed result, shared as Arc
//! ```
//!
//! The first caller to claim the vacant entry computes. Every other caller
//! creates the `notified()` future *before* releasing the map entry —
//! `Notify` only wakes futures that are already waiting, so creating it
//! after the release could miss a wake-up between the release and the wait.
//!
//! A computation that loses the publish race is discarded in favor of the
//! winner's committed value. Failed computations evict their `Pending` entry
//! and wake waiters so a later pass can retry; errors are never cached. If a
//! computing caller is cancelled mid-flight, a drop guard performs the same
//! eviction, so cancellation never strands waiters — while entries already
//! committed stay valid and reusable.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::core::Result;

enum FlightState<V> {
    /// One caller is computing; everyone else waits on the notify.
    Pending(Arc<Notify>),
    /// Committed result.
    Ready(Arc<V>),
}

/// Concurrent memo map with single-flight semantics per key.
pub struct MemoCache<K, V> {
    entries: DashMap<K, FlightState<V>>,
}

impl<K, V> Default for MemoCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self { entries: DashMap::new() }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed value for `key`, if any. Never waits.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        match self.entries.get(key)?.value() {
            FlightState::Ready(value) => Some(value.clone()),
            FlightState::Pending(_) => None,
        }
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value(), FlightState::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the committed value for `key`, computing it at most once under
    /// concurrency.
    ///
    /// The winner of the entry race runs `compute`; losers wait and observe
    /// the winner's committed value. On error the entry is evicted, waiters
    /// are woken to retry, and the error is returned to the computing caller
    /// only.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let notify = Arc::new(Notify::new());

        loop {
            match self.entries.entry(key.clone()) {
                Entry::Occupied(entry) => match entry.get() {
                    FlightState::Ready(value) => {
                        return Ok(value.clone());
                    }
                    FlightState::Pending(existing) => {
                        let existing = existing.clone();
                        // Create the notified future before dropping the
                        // entry guard; Notify only wakes futures that are
                        // already waiting.
                        let notified = existing.notified();
                        drop(entry);
                        notified.await;
                    }
                },
                Entry::Vacant(entry) => {
                    entry.insert(FlightState::Pending(notify.clone()));
                    break;
                }
            }
        }

        // This caller owns the flight. The guard evicts the Pending entry
        // and wakes waiters unless the result gets published first, covering
        // both the error path and cancellation of this future.
        let guard = FlightGuard { cache: self, key: &key, notify: &notify };
        match compute().await {
            Ok(value) => {
                let value = self.publish(&key, Arc::new(value));
                guard.disarm();
                notify.notify_waiters();
                Ok(value)
            }
            Err(err) => {
                drop(guard);
                Err(err)
            }
        }
    }

    /// Commit `value` for `key` unless another flight already committed one;
    /// in that race the existing value wins and `value` is discarded.
    fn publish(&self, key: &K, value: Arc<V>) -> Arc<V> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut entry) => match entry.get() {
                FlightState::Ready(existing) => existing.clone(),
                FlightState::Pending(_) => {
                    entry.insert(FlightState::Ready(value.clone()));
                    value
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(FlightState::Ready(value.clone()));
                value
            }
        }
    }

    fn evict_pending(&self, key: &K, notify: &Arc<Notify>) {
        self.entries.remove_if(key, |_, state| {
            matches!(state, FlightState::Pending(n) if Arc::ptr_eq(n, notify))
        });
        notify.notify_waiters();
    }
}

/// Evicts this flight's `Pending` entry on drop unless disarmed.
struct FlightGuard<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    cache: &'a MemoCache<K, V>,
    key: &'a K,
    notify: &'a Arc<Notify>,
}

impl<K, V> FlightGuard<'_, K, V>
where
    K: Eq + Hash + Clone,
{
    fn disarm(self) {
        std::mem::forget(self);
    }
}

impl<K, V> Drop for FlightGuard<'_, K, V>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.cache.evict_pending(self.key, self.notify);
    }
}
