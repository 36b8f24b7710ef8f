//! Counting capacity gate for bounded-memory admission

use std::sync::{Condvar, Mutex};

/// Counting gate over a fixed budget of permits.
///
/// Admission control for the flow layer: the gate starts with one permit
/// per byte of buffer capacity, producers take permits before staging
/// bytes, and extraction gives them back as bytes leave the buffer.
#[derive(Debug)]
pub struct CapacityGate {
    permits: Mutex<usize>,
    freed: Condvar,
}

impl CapacityGate {
    /// Create a gate holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        CapacityGate {
            permits: Mutex::new(permits),
            freed: Condvar::new(),
        }
    }

    /// Take `count` permits, blocking until that many are available.
    ///
    /// A request larger than the gate's total budget never completes;
    /// callers bound their requests by the construction-time permit count.
    pub fn acquire(&self, count: usize) {
        let mut permits = self.permits.lock().unwrap();
        while *permits < count {
            permits = self.freed.wait(permits).unwrap();
        }
        *permits -= count;
    }

    /// Take `count` permits if they are all available right now.
    pub fn try_acquire(&self, count: usize) -> bool {
        let mut permits = self.permits.lock().unwrap();
        if *permits >= count {
            *permits -= count;
            true
        } else {
            false
        }
    }

    /// Return `count` permits and wake blocked acquirers.
    pub fn release(&self, count: usize) {
        let mut permits = self.permits.lock().unwrap();
        *permits += count;
        drop(permits);
        // Waiters want differing counts, so every one gets to re-check.
        self.freed.notify_all();
    }

    /// Permits available right now.
    pub fn available(&self) -> usize {
        *self.permits.lock().unwrap()
    }
}
