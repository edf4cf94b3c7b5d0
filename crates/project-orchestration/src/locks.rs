//! Per-key mutual exclusion for start requests.

use futures::lock::{Mutex, OwnedMutexGuard};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

/// A set of async locks addressed by `(project id, environment)`
///
/// Requests for the same key are serialized; requests for different keys
/// never contend. Lock entries are dropped again once nobody holds or waits
/// on them.
#[derive(Default)]
pub struct KeyedLocks {
    locks: SyncMutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

/// Guard returned by [`KeyedLocks::lock`]; releases the key on drop
pub struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: (String, String),
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    /// Create an empty lock set
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `(project_id, environment)`
    pub async fn lock(&self, project_id: &str, environment: &str) -> KeyedGuard<'_> {
        let key = (project_id.to_string(), environment.to_string());
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let guard = mutex.lock_owned().await;
        KeyedGuard {
            owner: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no key is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map holds a reference: no holder and no waiter left.
        if locks
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
