//! Counting gate bounding concurrent expensive I/O calls.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct Gate {
    capacity: usize,
    in_flight: Mutex<usize>,
    released: Condvar,
}

/// Bounds the number of directory listings and content hashes running at
/// once. Clones share the same gate.
///
/// A capacity of 0 disables the bound. Waiters are woken in no particular
/// order. A permit must not be requested while the same call chain already
/// holds one.
#[derive(Debug, Clone, Default)]
pub struct IoLimiter {
    gate: Option<Arc<Gate>>,
}

/// Slot held for the duration of one expensive call; released on drop.
#[must_use = "the slot is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct IoPermit<'a> {
    gate: Option<&'a Gate>,
}

impl IoLimiter {
    /// Create a limiter allowing at most `capacity` concurrent calls.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            return Self::unlimited();
        }
        Self {
            gate: Some(Arc::new(Gate {
                capacity,
                in_flight: Mutex::new(0),
                released: Condvar::new(),
            })),
        }
    }

    /// Create a limiter that never blocks.
    pub fn unlimited() -> Self {
        Self { gate: None }
    }

    /// Block until a slot is free, then take it.
    pub fn acquire(&self) -> IoPermit<'_> {
        let Some(gate) = self.gate.as_deref() else {
            return IoPermit { gate: None };
        };
        let mut in_flight = gate.in_flight.lock();
        while *in_flight >= gate.capacity {
            gate.released.wait(&mut in_flight);
        }
        *in_flight += 1;
        IoPermit { gate: Some(gate) }
    }

    /// Run `f` while holding a slot.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let _permit = self.acquire();
        f()
    }

    /// Maximum concurrent calls, `None` when unlimited.
    pub fn capacity(&self) -> Option<usize> {
        self.gate.as_ref().map(|g| g.capacity)
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.gate.as_ref().map_or(0, |g| *g.in_flight.lock())
    }
}

impl Drop for IoPermit<'_> {
    fn drop(&mut self) {
        if let Some(gate) = self.gate {
            let mut in_flight = gate.in_flight.lock();
            *in_flight -= 1;
            gate.released.notify_one();
        }
    }
}
