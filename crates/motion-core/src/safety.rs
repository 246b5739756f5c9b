//! Safety manager: tracks interlock, e-stop, and shutdown conditions and
//! gates motion/spindle/coolant energization.
//!
//! Redesigned from a style that would poll a hardware clock directly (the
//! way the firmware's thermal-runaway monitor called `embassy_time::Instant::now()`)
//! to one that takes an explicit millisecond tick, matching §1's "periodic
//! tick with a monotonically-increasing millisecond clock" collaborator
//! contract and making it host-testable without an embedded runtime.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterlockState {
    #[default]
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EstopState {
    #[default]
    Clear,
    Tripped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownState {
    #[default]
    Clear,
    Shutdown,
}

/// Tracks interlock/e-stop/shutdown and answers the gating questions the
/// canonical machine and toolheads need before energizing anything.
#[derive(Debug, Clone, Copy)]
pub struct SafetyManager {
    pub interlock: InterlockState,
    pub estop: EstopState,
    pub shutdown: ShutdownState,
    pub panic_latched: bool,
    last_tick_ms: u32,
}

impl Default for SafetyManager {
    fn default() -> Self {
        Self {
            interlock: InterlockState::default(),
            estop: EstopState::default(),
            shutdown: ShutdownState::default(),
            panic_latched: false,
            last_tick_ms: 0,
        }
    }
}

impl SafetyManager {
    pub const fn new() -> Self {
        Self {
            interlock: InterlockState::Closed,
            estop: EstopState::Clear,
            shutdown: ShutdownState::Clear,
            panic_latched: false,
            last_tick_ms: 0,
        }
    }

    /// Advances the manager's notion of time. Called once per LO-tier tick
    /// with the current millisecond clock reading; monotonic, wraps per
    /// `u32` semantics like the rest of the firmware's millisecond clock.
    pub fn tick(&mut self, tick_ms: u32) {
        self.last_tick_ms = tick_ms;
    }

    pub fn last_tick_ms(&self) -> u32 {
        self.last_tick_ms
    }

    pub fn open_interlock(&mut self) {
        self.interlock = InterlockState::Open;
    }

    pub fn close_interlock(&mut self) {
        self.interlock = InterlockState::Closed;
    }

    pub fn trip_estop(&mut self) {
        self.estop = EstopState::Tripped;
    }

    pub fn clear_estop(&mut self) {
        self.estop = EstopState::Clear;
    }

    pub fn enter_shutdown(&mut self) {
        self.shutdown = ShutdownState::Shutdown;
    }

    /// Panic latches until an explicit reset; no other call clears it.
    pub fn panic(&mut self) {
        self.panic_latched = true;
    }

    pub fn reset(&mut self) {
        self.panic_latched = false;
        self.shutdown = ShutdownState::Clear;
        self.estop = EstopState::Clear;
    }

    /// Whether the spindle/coolant may energize: no open interlock, no
    /// tripped e-stop, no shutdown, no latched panic.
    pub fn may_energize(&self) -> bool {
        !self.panic_latched
            && self.shutdown == ShutdownState::Clear
            && self.estop == EstopState::Clear
            && self.interlock == InterlockState::Closed
    }

    /// Whether motion may begin: same conditions as `may_energize`.
    pub fn may_move(&self) -> bool {
        self.may_energize()
    }

    /// User-initiated queue flush is gated by this; alarm-induced flush is
    /// not (see `MotionPlanner::flush_alarm`).
    pub fn can_queue_flush(&self) -> bool {
        !self.panic_latched && self.shutdown == ShutdownState::Clear
    }
}
