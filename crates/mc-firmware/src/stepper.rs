//! HI/LO-tier wiring for `dda-stepper`'s DDA engine.
//!
//! The host (`mc-host`) owns the canonical machine, the planner, and
//! kinematics; it ships already-resolved per-motor rate/direction/step
//! loads down the wire as `mc_proto::commands::QueueMove`. This module's
//! only job is the two tiers `dda-stepper` itself defines: the LO tier
//! turns a decoded `QueueMove` into a `PreppedSegment` and publishes it to
//! the engine's double buffer; the HI tier is the hardware timer ISR that
//! calls `DdaEngine::on_hi_tier_tick` once per step-pulse period.
//!
//! Both tiers are plain functions operating on a shared `critical_section`
//! static so they can be called from either the Embassy task set or the
//! RTIC resource set without duplicating the engine.

use core::cell::RefCell;
use critical_section::Mutex;
use dda_stepper::{AtomicGpioPort, DdaChannelLoad, DdaEngine, PreppedSegment, Timer as DdaTimer, MAX_MOTORS};
use mc_proto::commands::QueueMove;

static ENGINE: Mutex<RefCell<DdaEngine<MAX_MOTORS>>> = Mutex::new(RefCell::new(DdaEngine::new()));

/// LO tier: converts a decoded `QueueMove` into a `PreppedSegment` and
/// hands it to the engine's double buffer. `is_new_block` is carried by
/// the caller (`proto_bridge`), which knows whether this is the first
/// segment after an idle gap or a continuation of a running block.
///
/// Returns `false` if the HI tier hasn't consumed the previously prepared
/// segment yet; the caller should hold the command and retry.
pub fn load_segment(queue_move: &QueueMove, is_new_block: bool) -> bool {
    let mut channels = [DdaChannelLoad::EMPTY; MAX_MOTORS];
    for (i, ch) in queue_move.channels.iter().enumerate() {
        channels[i] = DdaChannelLoad {
            rate: ch.rate as i64,
            direction: ch.direction_positive,
            steps: ch.steps,
        };
    }
    let segment = PreppedSegment {
        channels,
        hi_tier_ticks: queue_move.hi_tier_ticks,
        is_end_of_block: queue_move.is_end_of_block,
        is_new_block,
    };
    critical_section::with(|cs| ENGINE.borrow(cs).borrow().prep(segment))
}

/// Arms the engine once the first segment of a freshly-idle run has been
/// prepped. Idempotent: a no-op if the engine is already running.
pub fn start_if_idle() {
    critical_section::with(|cs| {
        let mut engine = ENGINE.borrow(cs).borrow_mut();
        if !engine.is_running() {
            engine.start();
        }
    });
}

pub fn is_running() -> bool {
    critical_section::with(|cs| ENGINE.borrow(cs).borrow().is_running())
}

pub fn has_prep_pending() -> bool {
    critical_section::with(|cs| ENGINE.borrow(cs).borrow().has_prep_pending())
}

pub fn motor_position(motor: usize) -> Option<i32> {
    critical_section::with(|cs| ENGINE.borrow(cs).borrow().position(motor))
}

pub fn sync_motor_position(motor: usize, position: i32) {
    critical_section::with(|cs| ENGINE.borrow(cs).borrow_mut().sync_position(motor, position));
}

/// HI tier: the entire timer-ISR critical path. Gated by the safety
/// manager first -- an open interlock or tripped e-stop stops the timer
/// immediately rather than letting the currently-loaded segment run out,
/// since a loaded segment may be several seconds long.
pub fn on_hi_tier_tick<STEP_PORT, DIR_PORT, TIMER>(
    step_port: &Mutex<RefCell<STEP_PORT>>,
    dir_port: &Mutex<RefCell<DIR_PORT>>,
    timer: &Mutex<RefCell<TIMER>>,
) where
    STEP_PORT: AtomicGpioPort,
    DIR_PORT: AtomicGpioPort,
    TIMER: DdaTimer,
{
    if !crate::safety::may_move() {
        critical_section::with(|cs| timer.borrow(cs).borrow_mut().stop());
        return;
    }
    critical_section::with(|cs| {
        ENGINE.borrow(cs).borrow_mut().on_hi_tier_tick(step_port, dir_port, timer);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_proto::commands::ChannelLoad;

    fn move_for_motor_zero(rate: u32, steps: u32, hi_tier_ticks: u32) -> QueueMove {
        let mut channels = [ChannelLoad::default(); MAX_MOTORS];
        channels[0] = ChannelLoad { rate, direction_positive: true, steps };
        QueueMove { channels, hi_tier_ticks, is_end_of_block: true }
    }

    #[test]
    fn load_segment_accepts_the_first_prep_and_rejects_a_second_before_consumption() {
        assert!(load_segment(&move_for_motor_zero(1000, 10, 100), true));
        assert!(!load_segment(&move_for_motor_zero(1000, 10, 100), false));
    }
}
