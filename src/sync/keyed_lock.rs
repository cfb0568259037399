//! Per-key async mutual exclusion.
//!
//! Wraps read-check-then-write sequences that must run at most once at a
//! time for a given key, e.g. "is this credential cached? if not, build it
//! and store it". Holders of different keys never wait on each other.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// The exclusion token of one key and how many guards hold or wait for it.
#[derive(Default)]
struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    users: usize,
}

type Slots<K> = Mutex<HashMap<K, Slot>>;

/// A map from key to an exclusion token.
///
/// Entries exist only while someone holds or waits for the key; the last
/// holder or waiter to leave removes it, whether it finished or was dropped
/// while still waiting.
pub struct KeyedLock<K: Eq + Hash + Clone> {
    slots: Arc<Slots<K>>,
}

impl<K: Eq + Hash + Clone> KeyedLock<K> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wait until `key` is free and take it.
    ///
    /// The key is released when the returned guard drops, including when
    /// the holding future is cancelled or returns early with an error.
    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let mutex = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_default();
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };

        // Registered before waiting so a cancelled wait still gives the slot back.
        let mut held = KeyedGuard {
            key,
            slots: Arc::clone(&self.slots),
            guard: None,
        };
        held.guard = Some(mutex.lock_owned().await);
        held
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.slots.lock().len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLock<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of holding one key of a [`KeyedLock`].
pub struct KeyedGuard<K: Eq + Hash + Clone> {
    key: K,
    slots: Arc<Slots<K>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> KeyedGuard<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut slots = self.slots.lock();
        let idle = match slots.get_mut(&self.key) {
            Some(slot) => {
                slot.users = slot.users.saturating_sub(1);
                slot.users == 0
            }
            None => false,
        };
        if idle {
            slots.remove(&self.key);
        }
    }
}
