#![no_std]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! # Digital-Differential-Analyzer Step-Pulse Engine
//!
//! Generalizes the teacher's pipelined, lock-free `StepperController` (which
//! dequeued one discrete `StepCommand { stepper_mask, direction_mask,
//! interval_ticks }` per timer interrupt from a `heapless::spsc::Queue`) into
//! a true multi-motor DDA: instead of a queue of pre-timed pulses, each motor
//! carries a phase accumulator advanced by a fixed-point `rate` every
//! HI-tier tick, firing a step whenever the accumulator crosses
//! [`DDA_SUBSTEPS`]. The planner/kinematics pair (LO tier) computes one
//! segment's worth of rates ahead of time and publishes it through
//! [`DoubleBuffer`], which the HI-tier ISR swaps in with a single atomic
//! flag check — no lock, no queue, matching the no-alloc/no-block
//! HI-tier constraint.
//!
//! The accumulator is never reset to zero on a step: it carries its
//! fractional remainder forward (`accumulator -= DDA_SUBSTEPS`), so a rate
//! change between segments doesn't introduce a timing discontinuity. On a
//! genuinely fresh block (after an idle gap or a direction reversal) the
//! accumulator is instead divided down by [`ACCUMULATOR_RESET_FACTOR`],
//! bounding how much residual phase a stale segment can carry into a move
//! that has nothing to do with it.

use core::cell::{RefCell, UnsafeCell};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use critical_section::Mutex;

/// Motors this engine can drive; mirrors [`motion_core`]'s kinematics motor
/// ceiling without taking a dependency on that crate (dda-stepper sits below
/// it in the stack).
pub const MAX_MOTORS: usize = 6;

/// Fixed-point scale of the per-motor phase accumulator. A channel's
/// `accumulator` field advances by `rate` every HI-tier tick and emits a
/// step each time it crosses a multiple of this value.
pub const DDA_SUBSTEPS: i64 = 100_000;

/// Divisor applied to a channel's accumulator when a fresh block starts
/// (rather than a new segment of the same running block).
pub const ACCUMULATOR_RESET_FACTOR: i64 = 2;

/// HI-tier timer interrupt rate: the rate at which `on_hi_tier_tick` is
/// expected to be called.
pub const FREQUENCY_HI_TIER_HZ: u32 = 100_000;

/// Nominal rate at which the DDA accumulator is evaluated against the
/// planner's step schedule; half the HI-tier rate, giving headroom for the
/// GPIO writes and position bookkeeping inside the tick to finish well
/// within one HI-tier period even on a modest Cortex-M part.
pub const FREQUENCY_DDA_HZ: u32 = 50_000;

const _: () = assert!(
    FREQUENCY_HI_TIER_HZ % FREQUENCY_DDA_HZ == 0,
    "HI-tier frequency must be an integer multiple of the DDA evaluation frequency"
);

/// One motor's phase accumulator and remaining step count for the
/// currently-loaded segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct DdaChannel {
    accumulator: i64,
    rate: i64,
    direction: bool,
    steps_remaining: u32,
    position: i32,
}

impl DdaChannel {
    /// Advances the accumulator by one HI-tier tick. Returns whether a step
    /// pulse should fire. Updates `position` on every fired step.
    #[inline(always)]
    pub fn tick(&mut self) -> bool {
        if self.steps_remaining == 0 {
            return false;
        }
        self.accumulator += self.rate;
        if self.accumulator >= DDA_SUBSTEPS {
            self.accumulator -= DDA_SUBSTEPS;
            self.steps_remaining -= 1;
            self.position = if self.direction {
                self.position.wrapping_add(1)
            } else {
                self.position.wrapping_sub(1)
            };
            true
        } else {
            false
        }
    }

    /// Loads a new rate/direction/step-count without touching the
    /// accumulator, preserving phase across a segment boundary within the
    /// same block.
    pub fn load(&mut self, load: DdaChannelLoad) {
        self.rate = load.rate;
        self.direction = load.direction;
        self.steps_remaining = load.steps;
    }

    /// Divides the accumulator down ahead of a fresh block's first segment.
    pub fn carry_over_for_new_block(&mut self) {
        self.accumulator /= ACCUMULATOR_RESET_FACTOR;
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn direction(&self) -> bool {
        self.direction
    }

    pub fn steps_remaining(&self) -> u32 {
        self.steps_remaining
    }

    pub fn sync_position(&mut self, position: i32) {
        self.position = position;
    }
}

/// Per-motor rate/direction/step-count for one prepared segment.
#[derive(Debug, Clone, Copy)]
pub struct DdaChannelLoad {
    pub rate: i64,
    pub direction: bool,
    pub steps: u32,
}

impl DdaChannelLoad {
    pub const EMPTY: Self = Self {
        rate: 0,
        direction: false,
        steps: 0,
    };
}

impl Default for DdaChannelLoad {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// One HI-tier-ready segment: per-motor rates plus the segment's duration
/// in HI-tier ticks.
#[derive(Debug, Clone, Copy)]
pub struct PreppedSegment {
    pub channels: [DdaChannelLoad; MAX_MOTORS],
    pub hi_tier_ticks: u32,
    /// Set on the last segment of a block, so the HI-tier loop knows it can
    /// report the block complete once this segment runs out.
    pub is_end_of_block: bool,
    /// Set on the first segment of a fresh block, telling the HI tier to
    /// apply `carry_over_for_new_block` before loading it.
    pub is_new_block: bool,
}

impl PreppedSegment {
    pub const EMPTY: Self = Self {
        channels: [DdaChannelLoad::EMPTY; MAX_MOTORS],
        hi_tier_ticks: 0,
        is_end_of_block: true,
        is_new_block: false,
    };
}

impl Default for PreppedSegment {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Lock-free double buffer publishing one prepared segment from the LO tier
/// to the HI tier. Ownership of each of the two slots flips with a single
/// atomic index and a ready flag; there is no mutex because only one side
/// ever writes to a given slot at a time by construction.
pub struct DoubleBuffer {
    slots: [UnsafeCell<PreppedSegment>; 2],
    runtime_index: AtomicUsize,
    prep_ready: AtomicBool,
}

// SAFETY: `slots[i]` is written only by the LO-tier `write_prep` call (when
// `i` is not the current runtime index) and read only by the HI-tier
// `runtime` call (always at the current runtime index); the `prep_ready`
// flag with Acquire/Release ordering establishes happens-before between the
// write and the subsequent swap that makes it the runtime index.
unsafe impl Sync for DoubleBuffer {}

impl DoubleBuffer {
    pub const fn new() -> Self {
        Self {
            slots: [UnsafeCell::new(PreppedSegment::EMPTY), UnsafeCell::new(PreppedSegment::EMPTY)],
            runtime_index: AtomicUsize::new(0),
            prep_ready: AtomicBool::new(false),
        }
    }

    /// LO tier: writes `segment` into the slot not currently owned by the
    /// HI tier. Returns `false` (and drops the write) if the HI tier hasn't
    /// consumed the previously prepared segment yet.
    pub fn write_prep(&self, segment: PreppedSegment) -> bool {
        if self.prep_ready.load(Ordering::Acquire) {
            return false;
        }
        let idx = 1 - self.runtime_index.load(Ordering::Relaxed);
        unsafe {
            *self.slots[idx].get() = segment;
        }
        self.prep_ready.store(true, Ordering::Release);
        true
    }

    /// HI tier: flips to the prepared slot if one is ready. Returns whether
    /// a swap occurred.
    pub fn try_swap(&self) -> bool {
        if !self.prep_ready.load(Ordering::Acquire) {
            return false;
        }
        let new_idx = 1 - self.runtime_index.load(Ordering::Relaxed);
        self.runtime_index.store(new_idx, Ordering::Release);
        self.prep_ready.store(false, Ordering::Release);
        true
    }

    /// HI tier: reads the currently active segment.
    pub fn runtime(&self) -> PreppedSegment {
        let idx = self.runtime_index.load(Ordering::Acquire);
        unsafe { *self.slots[idx].get() }
    }

    pub fn has_prep_pending(&self) -> bool {
        self.prep_ready.load(Ordering::Acquire)
    }
}

impl Default for DoubleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// A GPIO port supporting atomic multi-pin set/clear, mapping to hardware
/// features like STM32's BSRR register for single-instruction, ISR-safe
/// writes.
pub trait AtomicGpioPort {
    fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8);
    fn write(&mut self, mask: u8);
}

pub trait Timer {
    fn schedule_next(&mut self, ticks: u16);
    fn trigger_now(&mut self);
    fn stop(&mut self);
}

/// The HI-tier engine: `N` DDA channels plus the double buffer feeding them.
/// `on_hi_tier_tick` is the entire critical path run from the timer ISR.
pub struct DdaEngine<const N: usize> {
    channels: [DdaChannel; N],
    buffer: DoubleBuffer,
    ticks_remaining: u32,
    running: bool,
}

impl<const N: usize> DdaEngine<N> {
    pub fn new() -> Self {
        assert!(N <= MAX_MOTORS, "dda-stepper supports at most MAX_MOTORS channels");
        Self {
            channels: [DdaChannel::default(); N],
            buffer: DoubleBuffer::new(),
            ticks_remaining: 0,
            running: false,
        }
    }

    /// LO tier: publishes the next segment. Returns `false` if the HI tier
    /// hasn't consumed the previous one (the caller should retry next tick).
    pub fn prep(&self, segment: PreppedSegment) -> bool {
        self.buffer.write_prep(segment)
    }

    /// Arms the engine: swaps in the first prepared segment and begins
    /// counting ticks. Call once after priming `prep` with the first
    /// segment and before the timer ISR starts firing.
    pub fn start(&mut self) {
        self.running = true;
        self.advance_segment();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The entire HI-tier critical path: advance every channel's
    /// accumulator by one tick, write the resulting step/direction bitmasks
    /// to the given ports, and roll over to the next prepared segment when
    /// this one runs out.
    #[inline(always)]
    pub fn on_hi_tier_tick<STEP_PORT, DIR_PORT, TIMER>(
        &mut self,
        step_port: &Mutex<RefCell<STEP_PORT>>,
        dir_port: &Mutex<RefCell<DIR_PORT>>,
        timer: &Mutex<RefCell<TIMER>>,
    ) where
        STEP_PORT: AtomicGpioPort,
        DIR_PORT: AtomicGpioPort,
        TIMER: Timer,
    {
        if !self.running {
            critical_section::with(|cs| timer.borrow(cs).borrow_mut().stop());
            return;
        }

        let mut step_mask = 0u8;
        let mut dir_mask = 0u8;
        for i in 0..N {
            if self.channels[i].direction() {
                dir_mask |= 1 << i;
            }
            if self.channels[i].tick() {
                step_mask |= 1 << i;
            }
        }

        critical_section::with(|cs| {
            dir_port.borrow(cs).borrow_mut().write(dir_mask);
            if step_mask != 0 {
                step_port.borrow(cs).borrow_mut().set_and_clear_atomic(step_mask, step_mask);
            }
        });

        if self.ticks_remaining > 0 {
            self.ticks_remaining -= 1;
        }
        if self.ticks_remaining == 0 {
            self.advance_segment();
        }

        critical_section::with(|cs| {
            let timer = &mut *timer.borrow(cs).borrow_mut();
            if self.running {
                timer.schedule_next(1);
            } else {
                timer.stop();
            }
        });
    }

    fn advance_segment(&mut self) {
        if !self.buffer.try_swap() {
            self.running = false;
            return;
        }
        let segment = self.buffer.runtime();
        for i in 0..N {
            if segment.is_new_block {
                self.channels[i].carry_over_for_new_block();
            }
            self.channels[i].load(segment.channels[i]);
        }
        self.ticks_remaining = segment.hi_tier_ticks.max(1);
    }

    pub fn position(&self, motor: usize) -> Option<i32> {
        self.channels.get(motor).map(|c| c.position())
    }

    pub fn sync_position(&mut self, motor: usize, position: i32) {
        if let Some(channel) = self.channels.get_mut(motor) {
            channel.sync_position(position);
        }
    }

    pub fn has_prep_pending(&self) -> bool {
        self.buffer.has_prep_pending()
    }
}

impl<const N: usize> Default for DdaEngine<N> {
    fn default() -> Self {
        Self::new()
    }
}
