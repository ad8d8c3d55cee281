//! Cancellable timer scheduler
//!
//! Every delayed action in the session (reconnect delay, auto-save
//! debounce, cursor flush, cache sweep) runs through one scheduler so
//! teardown can cancel the lot deterministically instead of chasing
//! scattered timers.
//!
//! Timers are keyed: scheduling a key that is already armed replaces the
//! old timer, which is exactly the debounce behavior auto-save needs. On
//! expiry the timer's event is delivered to the channel given at
//! construction; the owner feeds it back into its event loop.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Keyed, cancellable one-shot and repeating timers
pub struct Scheduler<K, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    tx: mpsc::UnboundedSender<E>,
    armed: HashMap<K, JoinHandle<()>>,
}

impl<K, E> Scheduler<K, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create a scheduler delivering expired-timer events to `tx`.
    pub fn new(tx: mpsc::UnboundedSender<E>) -> Self {
        Self {
            tx,
            armed: HashMap::new(),
        }
    }

    /// Arm a one-shot timer. Re-arming a key cancels its previous timer
    /// first (debounce).
    pub fn schedule(&mut self, key: K, delay: Duration, event: E) {
        self.cancel(&key);
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
        self.armed.insert(key, handle);
    }

    /// Arm a repeating timer firing every `interval`.
    pub fn schedule_repeating(&mut self, key: K, interval: Duration, event: E) {
        self.cancel(&key);
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick of tokio's interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(event.clone()).is_err() {
                    break;
                }
            }
        });
        self.armed.insert(key, handle);
    }

    /// Disarm a timer. No-op when the key is not armed.
    pub fn cancel(&mut self, key: &K) {
        if let Some(handle) = self.armed.remove(key) {
            handle.abort();
        }
    }

    pub fn is_armed(&self, key: &K) -> bool {
        self.armed.contains_key(key)
    }

    /// Disarm everything. Called on session teardown.
    pub fn cancel_all(&mut self) {
        let count = self.armed.len();
        for (_, handle) in self.armed.drain() {
            handle.abort();
        }
        if count > 0 {
            debug!(count, "cancelled all timers");
        }
    }
}

impl<K, E> Drop for Scheduler<K, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn drop(&mut self) {
        self.cancel_all();
    }
}
