//! One-time readiness latch for dataset loading
//!
//! Workers block on the latch before their first dequeue; the loader sets it
//! exactly once after the dataset is frozen.

use std::sync::{Condvar, Mutex};

pub struct ReadyLatch {
    ready: Mutex<bool>,
    signal: Condvar,
}

impl ReadyLatch {
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(false),
            signal: Condvar::new(),
        }
    }

    /// Mark the latch as set and wake every waiter. Idempotent.
    pub fn set(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        *ready = true;
        self.signal.notify_all();
    }

    /// Block until the latch is set. Returns immediately if already set.
    pub fn wait(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        while !*ready {
            ready = self
                .signal
                .wait(ready)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    pub fn is_set(&self) -> bool {
        *self.ready.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ReadyLatch {
    fn default() -> Self {
        Self::new()
    }
}
