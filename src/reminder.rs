use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::debug;

struct Pending {
    id: u64,
    handle: AbortHandle,
}

type PendingMap = Arc<Mutex<HashMap<String, Pending>>>;

/// Single-fire delayed tasks keyed by user id. Kept in memory only.
#[derive(Default)]
pub struct Reminders {
    pending: PendingMap,
    next_id: AtomicU64,
}

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<String, Pending>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Reminders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `fire` after `delay`, replacing any reminder already pending for `key`.
    pub fn arm<F, Fut>(&self, key: &str, delay: Duration, fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let owned_key = key.to_owned();

        // Held across spawn + insert so the task cannot look itself up before it is registered.
        let mut map = lock(&self.pending);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut map = lock(&pending);
                match map.get(&owned_key) {
                    Some(current) if current.id == id => {
                        map.remove(&owned_key);
                    }
                    _ => return,
                }
            }
            debug!(key = %owned_key, "reminder: firing");
            fire().await;
        });
        let previous = map.insert(
            key.to_owned(),
            Pending {
                id,
                handle: task.abort_handle(),
            },
        );
        drop(map);

        if let Some(previous) = previous {
            previous.handle.abort();
            debug!(key, "reminder: replaced pending one");
        }
        debug!(key, delay_secs = delay.as_secs(), "reminder: armed");
    }

    /// Cancels the pending reminder for `key`. Returns whether one was pending.
    pub fn disarm(&self, key: &str) -> bool {
        match lock(&self.pending).remove(key) {
            Some(pending) => {
                pending.handle.abort();
                debug!(key, "reminder: disarmed");
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, key: &str) -> bool {
        lock(&self.pending).contains_key(key)
    }
}
