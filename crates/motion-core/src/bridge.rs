//! Bridges one planner `ExecSegment` into a `dda-stepper` `PreppedSegment`.
//!
//! This is the LO-tier "prep" half of the control flow: `MotionPlanner::exec`
//! produces a time-bounded slice of a block, kinematics turns its end
//! position into absolute motor step targets, and this module turns the
//! step delta against the last-known motor position into the fixed-point
//! DDA rate the HI tier consumes.

use crate::kinematics::Kinematics;
use crate::planner::ExecSegment;
use crate::MAX_AXES;
use dda_stepper::{DdaChannelLoad, PreppedSegment, DDA_SUBSTEPS, FREQUENCY_HI_TIER_HZ, MAX_MOTORS as DDA_MAX_MOTORS};

const _: () = assert!(
    crate::kinematics::MAX_MOTORS == DDA_MAX_MOTORS,
    "kinematics and dda-stepper motor counts must match"
);

/// Advances `position`/`motor_steps` by one segment and returns the
/// corresponding `PreppedSegment`. `is_new_block` should be set on the first
/// segment of a block so the HI tier divides down residual accumulator
/// phase rather than carrying it over.
pub fn prep_segment(
    seg: &ExecSegment,
    kinematics: &mut dyn Kinematics,
    position: &mut [f32; MAX_AXES],
    motor_steps: &mut [i32; DDA_MAX_MOTORS],
    is_new_block: bool,
) -> PreppedSegment {
    let mut end_position = *position;
    for axis in 0..MAX_AXES {
        end_position[axis] += seg.unit_vector[axis] * seg.distance;
    }

    let hi_tier_ticks = ((seg.duration_min * 60.0) * FREQUENCY_HI_TIER_HZ as f32).round().max(1.0) as u32;

    let target_steps = kinematics.inverse_kinematics(&seg.gm, &end_position, position, seg.start_v, seg.end_v, seg.duration_min);

    let mut channels = [DdaChannelLoad::EMPTY; DDA_MAX_MOTORS];
    for m in 0..DDA_MAX_MOTORS {
        let delta = target_steps[m] - motor_steps[m];
        let direction = delta >= 0;
        let steps = delta.unsigned_abs();
        let rate = if steps > 0 { (DDA_SUBSTEPS * steps as i64) / hi_tier_ticks as i64 } else { 0 };
        channels[m] = DdaChannelLoad { rate, direction, steps };
        motor_steps[m] = target_steps[m];
    }

    *position = end_position;

    PreppedSegment {
        channels,
        hi_tier_ticks,
        is_end_of_block: seg.is_end_of_block,
        is_new_block,
    }
}
