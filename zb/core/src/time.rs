//! Millisecond application timers
//!
//! Timers are polled: the dispatcher drains elapsed milliseconds from the
//! [`TickAccumulator`] (fed by the timer interrupt) and advances every armed
//! [`AppTimer`]. An expired timer is observed by the owning component as a
//! state transition, never as an interrupt.

use core::cell::Cell;
use core::fmt;
use critical_section::Mutex;

/// Duration in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Millis(pub u32);

impl Millis {
    pub const ZERO: Self = Self(0);

    pub const fn new(ms: u32) -> Self {
        Self(ms)
    }

    pub const fn from_secs(secs: u32) -> Self {
        Self(secs.saturating_mul(1000))
    }

    pub const fn as_millis(self) -> u32 {
        self.0
    }

    pub fn saturating_add(self, other: Millis) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Millis {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}ms", self.0);
    }
}

/// Timer firing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    OneShot,
    Repeat,
}

/// Polled millisecond timer owned by a component
#[derive(Debug, Clone, Copy)]
pub struct AppTimer {
    interval: Millis,
    remaining: u32,
    mode: TimerMode,
    armed: bool,
}

impl AppTimer {
    pub const fn new() -> Self {
        Self {
            interval: Millis::ZERO,
            remaining: 0,
            mode: TimerMode::OneShot,
            armed: false,
        }
    }

    /// Arm the timer, restarting it if already running
    pub fn start(&mut self, interval: Millis, mode: TimerMode) {
        self.interval = interval;
        self.remaining = interval.0;
        self.mode = mode;
        self.armed = true;
    }

    pub fn stop(&mut self) {
        self.armed = false;
        self.remaining = 0;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn interval(&self) -> Millis {
        self.interval
    }

    pub fn remaining(&self) -> Millis {
        Millis(self.remaining)
    }

    /// Advance by `elapsed` milliseconds; returns `true` when the timer fired
    pub fn advance(&mut self, elapsed: u32) -> bool {
        if !self.armed {
            return false;
        }
        if elapsed < self.remaining {
            self.remaining -= elapsed;
            return false;
        }
        match self.mode {
            TimerMode::OneShot => {
                self.armed = false;
                self.remaining = 0;
            }
            TimerMode::Repeat => {
                self.remaining = self.interval.0.max(1);
            }
        }
        true
    }
}

impl Default for AppTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Millisecond counter shared between the tick interrupt and the dispatcher
pub struct TickAccumulator {
    pending: Mutex<Cell<u32>>,
}

impl TickAccumulator {
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(Cell::new(0)),
        }
    }

    /// Record elapsed milliseconds (interrupt context)
    pub fn add(&self, ms: u32) {
        critical_section::with(|cs| {
            let cell = self.pending.borrow(cs);
            cell.set(cell.get().saturating_add(ms));
        });
    }

    /// Take everything accumulated since the last call
    pub fn take(&self) -> u32 {
        critical_section::with(|cs| self.pending.borrow(cs).replace(0))
    }
}

impl Default for TickAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
