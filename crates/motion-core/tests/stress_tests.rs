//! Stress tests: queue saturation, high feed rates, and many small
//! cornering segments (the lookahead/junction-velocity path).

use motion_core::canonical::{FeedRateMode, GCodeState};
use motion_core::errors::PlannerError;
use motion_core::kinematics::CartesianKinematics;
use motion_core::planner::{MotionPlanner, MoveType, PLANNER_BUFFER_SIZE};
use motion_core::{prep_segment, MAX_AXES};

fn jerk_feed_steps() -> ([f32; MAX_AXES], [f32; MAX_AXES], [f32; MAX_AXES]) {
    let mut jerk = [0.0; MAX_AXES];
    let mut feed = [0.0; MAX_AXES];
    let mut steps = [0.0; MAX_AXES];
    for i in 0..3 {
        jerk[i] = 500.0;
        feed[i] = 12000.0;
        steps[i] = 80.0;
    }
    (jerk, feed, steps)
}

fn gm_feed(feed_rate: f32) -> GCodeState {
    let mut gm = GCodeState::default();
    gm.feed_rate_mode = FeedRateMode::UnitsPerMinute;
    gm.feed_rate = feed_rate;
    gm
}

#[test]
fn planner_buffer_reports_full_once_saturated() {
    let (jerk, feed, steps) = jerk_feed_steps();
    let mut planner = MotionPlanner::new(jerk, feed, steps);

    let mut position = [0.0f32; MAX_AXES];
    for i in 0..PLANNER_BUFFER_SIZE {
        let mut target = position;
        target[0] += 1.0;
        let result = planner.aline(&target, &position, &gm_feed(600.0), MoveType::Aligned, 0.1);
        assert!(result.is_ok(), "move {i} should have queued");
        position = target;
    }

    let mut target = position;
    target[0] += 1.0;
    let result = planner.aline(&target, &position, &gm_feed(600.0), MoveType::Aligned, 0.1);
    assert_eq!(result, Err(PlannerError::QueueFull));
}

#[test]
fn high_feed_rate_move_never_emits_a_zero_or_negative_duration_segment() {
    let (jerk, feed, steps) = jerk_feed_steps();
    let mut planner = MotionPlanner::new(jerk, feed, steps);

    // 200mm move at a very high requested feed rate: the axis feedrate cap
    // (12000 units/min on X) should clamp the cruise velocity rather than
    // the planner emitting a runaway segment duration.
    let mut target = [0.0; MAX_AXES];
    target[0] = 200.0;
    planner.aline(&target, &[0.0; MAX_AXES], &gm_feed(50_000.0), MoveType::Aligned, 0.1).unwrap();

    let mut kinematics = CartesianKinematics::new([80.0, 80.0, 400.0, 0.0, 0.0, 0.0], [0, 1, 2, -1, -1, -1]);
    let mut position = [0.0f32; MAX_AXES];
    let mut motor_steps = [0i32; 6];
    let mut is_first = true;
    let mut segment_count = 0;
    while let Some(seg) = planner.exec() {
        assert!(seg.duration_min > 0.0, "segment duration must not be zero");
        let prepped = prep_segment(&seg, &mut kinematics, &mut position, &mut motor_steps, is_first);
        is_first = false;
        assert!(prepped.hi_tier_ticks > 0);
        segment_count += 1;
        assert!(segment_count < 1_000_000, "planner did not converge on a finished move");
    }
    assert_eq!(motor_steps[0], 16_000); // 200mm * 80 steps/mm
}

#[test]
fn many_small_segments_around_a_circle_complete_without_stalling() {
    let (jerk, feed, steps) = jerk_feed_steps();
    let mut planner = MotionPlanner::new(jerk, feed, steps);
    let segments = 64;
    let radius = 20.0; // mm

    let mut position = [0.0f32; MAX_AXES];

    for i in 1..=segments {
        let angle = (i as f32 / segments as f32) * 2.0 * core::f32::consts::PI;
        let mut target = position;
        target[0] = radius * angle.cos();
        target[1] = radius * angle.sin();

        // A large junction_integration_time encourages cornering speed, the
        // same lookahead effect the block-level junction_vmax models.
        planner.aline(&target, &position, &gm_feed(3000.0), MoveType::Aligned, 0.5).unwrap();
        position = target;
    }

    let mut blocks_seen = 0;
    let mut first_segment_of_block = true;
    while let Some(seg) = planner.exec() {
        if first_segment_of_block {
            blocks_seen += 1;
            first_segment_of_block = false;
        }
        if seg.is_end_of_block {
            first_segment_of_block = true;
        }
    }
    assert_eq!(blocks_seen, segments);
}

#[test]
fn command_blocks_interleave_with_motion_blocks_without_corrupting_step_state() {
    use motion_core::planner::CommandKind;

    let (jerk, feed, steps) = jerk_feed_steps();
    let mut planner = MotionPlanner::new(jerk, feed, steps);

    let mut target = [0.0; MAX_AXES];
    target[0] = 5.0;
    planner.aline(&target, &[0.0; MAX_AXES], &gm_feed(600.0), MoveType::Aligned, 0.1).unwrap();
    planner
        .queue_command(&GCodeState::default(), CommandKind::CoolantOn, [0.0, 0.0])
        .unwrap();
    let mut target2 = target;
    target2[0] = 10.0;
    planner.aline(&target2, &target, &gm_feed(600.0), MoveType::Aligned, 0.1).unwrap();

    let mut kinematics = CartesianKinematics::new([80.0, 80.0, 400.0, 0.0, 0.0, 0.0], [0, 1, 2, -1, -1, -1]);
    let mut position = [0.0f32; MAX_AXES];
    let mut motor_steps = [0i32; 6];
    let mut is_first = true;
    let mut saw_command = false;
    while let Some(seg) = planner.exec() {
        if seg.command == CommandKind::CoolantOn {
            saw_command = true;
            assert_eq!(seg.distance, 0.0);
            continue;
        }
        let _ = prep_segment(&seg, &mut kinematics, &mut position, &mut motor_steps, is_first);
        is_first = false;
    }
    assert!(saw_command);
    assert_eq!(motor_steps[0], 800); // 10mm * 80 steps/mm
}
