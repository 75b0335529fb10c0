use core::sync::atomic::{AtomicU16, Ordering};

/// Millisecond countdown capability used by every wait loop of the driver.
pub trait Clock {
    /// Start counting down `ms` milliseconds.
    fn arm(&self, ms: u16);

    /// The countdown reached zero.
    fn expired(&self) -> bool;

    /// Advance by one millisecond.
    fn tick(&self);
}

/// Countdown decremented by [`Clock::tick`], stops at zero.
///
/// Only plain loads and stores are used, so it works on cores without
/// compare-and-swap. There is a single writer per side: the tick source
/// decrements, the operation that armed it re-arms.
#[derive(Debug, Default)]
pub struct Countdown(AtomicU16);

impl Countdown {
    pub const fn new() -> Self {
        Countdown(AtomicU16::new(0))
    }

    /// Milliseconds left.
    pub fn remaining(&self) -> u16 {
        self.0.load(Ordering::Acquire)
    }
}

impl Clock for Countdown {
    fn arm(&self, ms: u16) {
        self.0.store(ms, Ordering::Release);
    }

    fn expired(&self) -> bool {
        self.remaining() == 0
    }

    fn tick(&self) {
        let n = self.0.load(Ordering::Acquire);
        if n != 0 {
            self.0.store(n - 1, Ordering::Release);
        }
    }
}
