//! Interruptible fixed-interval sleep

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Returned when a sleep was cut short
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sleep interrupted")]
pub struct Interrupted;

/// A sleep that another thread can cut short
///
/// The interrupt is sticky: once raised, every later sleep fails
/// immediately. Each monitor instance gets its own.
#[derive(Debug, Default)]
pub struct SleepInterrupt {
    raised: Mutex<bool>,
    cvar: Condvar,
}

impl SleepInterrupt {
    /// Create a new, lowered interrupt
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `duration` unless interrupted first
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        // No deadline means the sleep only ends on interrupt
        let deadline = Instant::now().checked_add(duration);
        let mut raised = self.raised.lock().unwrap_or_else(|e| e.into_inner());

        loop {
            if *raised {
                return Err(Interrupted);
            }
            // Spurious wakeups just go around again
            raised = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    self.cvar
                        .wait_timeout(raised, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
                None => self.cvar.wait(raised).unwrap_or_else(|e| e.into_inner()),
            };
        }
    }

    /// Wake any sleeper and fail all later sleeps
    pub fn interrupt(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(|e| e.into_inner());
        *raised = true;
        self.cvar.notify_all();
    }

    /// Check if the interrupt is raised
    pub fn is_raised(&self) -> bool {
        *self.raised.lock().unwrap_or_else(|e| e.into_inner())
    }
}
