//! tripwire-timers: keyed one-shot timers on the current thread.
//!
//! Every timer runs as a `spawn_local` task, so callers must be inside a
//! `tokio::task::LocalSet`. Fire closures do not need to be `Send`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Tracks outstanding timer tasks by key so they can be cleared deterministically.
///
/// At most one task is armed per key. Arming a key that is already armed
/// aborts the previous task first. Dropping the set aborts everything.
pub struct TimerSlots<K: Eq + Hash + Copy + Debug> {
    tasks: HashMap<K, JoinHandle<()>>,
}

impl<K: Eq + Hash + Copy + Debug> Default for TimerSlots<K> {
    fn default() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy + Debug> TimerSlots<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fire` once `delay` has elapsed.
    ///
    /// A zero delay still defers `fire` until the current task yields.
    pub fn notify_after(&mut self, key: K, delay: Duration, fire: impl FnOnce() + 'static) {
        self.notify_at(key, Instant::now() + delay, fire);
    }

    /// Run `fire` at `deadline` (immediately after the next yield if it has passed).
    pub fn notify_at(&mut self, key: K, deadline: Instant, fire: impl FnOnce() + 'static) {
        let handle = tokio::task::spawn_local(async move {
            if Instant::now() < deadline {
                tokio::time::sleep_until(deadline).await;
            }
            fire();
        });
        if let Some(previous) = self.tasks.insert(key, handle) {
            tracing::trace!(target: "tripwire-timers", "re-arming {:?}", key);
            previous.abort();
        }
    }

    /// Cancel the timer for `key`. Returns true if one was still outstanding.
    pub fn clear(&mut self, key: K) -> bool {
        match self.tasks.remove(&key) {
            Some(handle) => {
                let outstanding = !handle.is_finished();
                handle.abort();
                outstanding
            }
            None => false,
        }
    }

    /// Cancel every timer. Returns how many were still outstanding.
    pub fn clear_all(&mut self) -> usize {
        let mut outstanding = 0;
        for (_, handle) in self.tasks.drain() {
            if !handle.is_finished() {
                outstanding += 1;
            }
            handle.abort();
        }
        outstanding
    }

    /// Forget the task for `key` without aborting it.
    ///
    /// Called from inside a fire closure once the timer has gone off.
    pub fn release(&mut self, key: K) {
        self.tasks.remove(&key);
    }

    pub fn is_armed(&self, key: K) -> bool {
        self.tasks
            .get(&key)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn armed_count(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }
}

impl<K: Eq + Hash + Copy + Debug> Drop for TimerSlots<K> {
    fn drop(&mut self) {
        self.clear_all();
    }
}
