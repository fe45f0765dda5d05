//! Call Deduplication (singleflight)
//!
//! Collapses concurrent calls for the same key into one execution. The first
//! caller (the leader) runs the work; every caller arriving while it is in
//! flight (a follower) waits and receives a clone of the leader's result.
//!
//! ```text
//!  caller A ──┐                 ┌──▶ result ──▶ A
//!  caller B ──┼──▶ in-flight ───┼──▶ result ──▶ B      func runs once
//!  caller C ──┘     table       └──▶ result ──▶ C
//! ```
//!
//! The table lock is held only while the table itself is read or mutated,
//! never across the work future, so calls for other keys are not blocked.
//! Once the leader finishes, its record is removed: the next call for the
//! key runs the work again. Nothing is cached beyond the in-flight window.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

struct Call<T> {
    id: u64,
    rx: watch::Receiver<Option<T>>,
}

enum Role<T> {
    Leader(u64, watch::Sender<Option<T>>),
    Follower(watch::Receiver<Option<T>>),
}

/// Deduplicates concurrent work by key.
pub struct Flight<T> {
    calls: Mutex<HashMap<String, Call<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for Flight<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> std::fmt::Debug for Flight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flight")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl<T> Flight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with work currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Clone> Flight<T> {
    /// Run `func` for `key`, or join the execution already in flight.
    ///
    /// If the leader is dropped before producing a result, its record is
    /// cleared and waiting followers race to become the next leader, each
    /// with its own `func`.
    pub async fn work<F, Fut>(&self, key: &str, func: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        loop {
            match self.join(key) {
                Role::Follower(mut rx) => {
                    if let Ok(value) = rx.wait_for(Option::is_some).await {
                        if let Some(value) = value.as_ref() {
                            return value.clone();
                        }
                    }
                    // leader went away without a result
                }
                Role::Leader(id, tx) => {
                    let guard = LeaderGuard {
                        flight: self,
                        key,
                        id,
                    };
                    let value = func().await;
                    tx.send_replace(Some(value.clone()));
                    drop(guard);
                    return value;
                }
            }
        }
    }

    fn join(&self, key: &str) -> Role<T> {
        let mut calls = self.calls.lock();
        match calls.entry(key.to_string()) {
            Entry::Occupied(call) => Role::Follower(call.get().rx.clone()),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                slot.insert(Call { id, rx });
                Role::Leader(id, tx)
            }
        }
    }
}

/// Removes the leader's record on completion or cancellation.
struct LeaderGuard<'a, T> {
    flight: &'a Flight<T>,
    key: &'a str,
    id: u64,
}

impl<T> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        let mut calls = self.flight.calls.lock();
        if calls.get(self.key).is_some_and(|call| call.id == self.id) {
            calls.remove(self.key);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
