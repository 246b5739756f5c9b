#![deny(clippy::all)]
#![deny(warnings)]

//! # Safety Supervisor
//!
//! Fronts `motion_core::safety::SafetyManager` (the canonical
//! interlock/e-stop/shutdown gate) with the MCU-side concerns the host
//! can't reach: an independent hardware watchdog that resets the MCU if
//! the firmware hangs, and a fast, ISR-safe atomic flag the HI-tier timer
//! interrupt checks every tick without taking the `SafetyManager`'s
//! critical section.
//!
//! - **Watchdog**: the hardware's Independent Watchdog (IWDG) must be fed
//!   periodically from a task that only runs while the rest of the
//!   firmware is making progress; a hang stops the feed and resets the MCU.
//! - **Emergency stop**: `trip_estop` both latches the fast atomic flag
//!   `may_move` reads and updates the shared `SafetyManager`, so the host's
//!   next status report reflects the same state the firmware is acting on.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};
use critical_section::Mutex;
use motion_core::SafetyManager;

#[cfg(feature = "embassy-rt")]
use embassy_stm32::wdg::IndependentWatchdog;

static ESTOP_ACTIVE: AtomicBool = AtomicBool::new(false);
static MANAGER: Mutex<RefCell<SafetyManager>> = Mutex::new(RefCell::new(SafetyManager::new()));

/// Fast path for the HI-tier ISR: whether motion may continue this tick.
/// Backed by a plain atomic rather than the `SafetyManager`'s critical
/// section, since this is read on every step-pulse-period interrupt.
#[inline]
pub fn may_move() -> bool {
    !ESTOP_ACTIVE.load(Ordering::Acquire)
}

/// Trips the e-stop: sets the fast atomic flag and latches the shared
/// `SafetyManager` into the tripped state. Idempotent.
pub fn trip_estop() {
    ESTOP_ACTIVE.store(true, Ordering::Release);
    critical_section::with(|cs| MANAGER.borrow(cs).borrow_mut().trip_estop());
}

pub fn open_interlock() {
    critical_section::with(|cs| MANAGER.borrow(cs).borrow_mut().open_interlock());
}

pub fn close_interlock() {
    critical_section::with(|cs| MANAGER.borrow(cs).borrow_mut().close_interlock());
}

/// Clears the e-stop path: the fast flag first (so motion can resume),
/// then the shared manager's full reset (interlock state is untouched --
/// a cleared e-stop does not imply the interlock is closed).
pub fn reset() {
    critical_section::with(|cs| {
        let mut manager = MANAGER.borrow(cs).borrow_mut();
        manager.clear_estop();
        manager.panic_latched = false;
        manager.shutdown = motion_core::safety::ShutdownState::Clear;
    });
    ESTOP_ACTIVE.store(false, Ordering::Release);
}

/// Advances the shared manager's millisecond clock and mirrors its
/// `may_move` gate back into the fast atomic flag, so an interlock opened
/// or a shutdown entered through the manager (rather than through
/// `trip_estop` directly) also stops the HI tier.
pub fn tick(tick_ms: u32) {
    critical_section::with(|cs| {
        let mut manager = MANAGER.borrow(cs).borrow_mut();
        manager.tick(tick_ms);
        if !manager.may_move() {
            ESTOP_ACTIVE.store(true, Ordering::Release);
        }
    });
}

pub fn can_queue_flush() -> bool {
    critical_section::with(|cs| MANAGER.borrow(cs).borrow().can_queue_flush())
}

/// "Feeds" the independent watchdog. Must be called periodically from a
/// high-priority task to prevent the MCU from resetting.
#[cfg(feature = "embassy-rt")]
pub struct WatchdogFeeder<'a> {
    watchdog: IndependentWatchdog<'a>,
}

#[cfg(feature = "embassy-rt")]
impl<'a> WatchdogFeeder<'a> {
    pub fn new(mut watchdog: IndependentWatchdog<'a>) -> Self {
        watchdog.unleash();
        Self { watchdog }
    }

    #[inline]
    pub fn feed(&mut self) {
        self.watchdog.feed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_estop_blocks_may_move_until_reset() {
        reset();
        assert!(may_move());
        trip_estop();
        assert!(!may_move());
        reset();
        assert!(may_move());
    }

    #[test]
    fn open_interlock_is_reflected_through_tick() {
        reset();
        open_interlock();
        tick(10);
        assert!(!may_move());
        close_interlock();
        reset();
        assert!(may_move());
    }
}
