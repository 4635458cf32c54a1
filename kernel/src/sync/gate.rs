//! The handoff gate under every live execution.
//!
//! The hosted port backs each process with an OS thread that is parked
//! whenever its process is not running. A context switch is a direct
//! baton pass: the freezing thread opens the target's gate and then waits
//! on its own. At most one signal is ever in flight, because only one
//! execution holds the CPU.

use std::sync::{Condvar, Mutex, MutexGuard};

/// What a waiting execution is told when its gate opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The scheduler picked this process; resume it.
    Run,
    /// The process was killed while parked; unwind and exit.
    Exit,
}

/// A one-signal rendezvous point.
pub struct Gate {
    slot: Mutex<Option<Signal>>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    // A panicking lock holder can only be a fault path that is taking the
    // whole system down; the signal slot itself is always consistent.
    fn slot(&self) -> MutexGuard<'_, Option<Signal>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deposit a signal and wake the waiter. The waiter may not be
    /// parked yet; the signal is kept until consumed.
    pub fn open(&self, signal: Signal) {
        let mut slot = self.slot();
        *slot = Some(signal);
        self.cond.notify_one();
    }

    /// Park until a signal arrives, then consume it.
    pub fn wait(&self) -> Signal {
        let mut slot = self.slot();
        loop {
            if let Some(signal) = slot.take() {
                return signal;
            }
            slot = self.cond.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
