//! End-to-end simulation scenarios
//!
//! Each test exercises one of the behaviors a multi-axis motion core is
//! expected to get right. The protocol-level scenarios drive a real
//! `SimMcu` over its Unix socket with genuine `mc-proto` frames; the
//! planning-level scenarios (junction velocity, coordinate offsets, soft
//! limits, CoreXY) call `motion-core` directly, since those are host-side
//! decisions made before a move ever reaches the wire.

use anyhow::Result;
use mc_proto::commands::{ChannelLoad, Command, ConfigValue, QueueMove, StatusCode, MAX_MOTORS};
use motion_core::canonical::{FeedRateMode, GCodeState, MotionMode};
use motion_core::kinematics::Kinematics;
use motion_core::planner::MoveType;
use motion_core::{CanonicalMachine, CartesianKinematics, CoreXyKinematics, MotionPlanner, MAX_AXES};
use sim::{SimHost, SimMcu, SimResponse};
use std::time::Duration;

const STEPS_PER_UNIT: f32 = 100.0;

/// Builds a single-motor `QueueMove` whose rate is derived the way
/// `dda-stepper`'s own tests derive it: `rate = DDA_SUBSTEPS * steps /
/// hi_tier_ticks`, with two ticks budgeted per step so the accumulator
/// clears exactly on schedule with no rounding loss.
fn queue_move_for(steps_x: i32) -> QueueMove {
    let steps = steps_x.unsigned_abs();
    let hi_tier_ticks = (steps * 2).max(2);
    let rate = ((dda_stepper::DDA_SUBSTEPS * steps as i64) / hi_tier_ticks as i64) as u32;
    let mut channels = [ChannelLoad::default(); MAX_MOTORS];
    channels[0] = ChannelLoad { rate, direction_positive: steps_x >= 0, steps };
    QueueMove { channels, hi_tier_ticks, is_end_of_block: true }
}

async fn spawn_sim_mcu(socket_path: &'static str) {
    let _ = std::fs::remove_file(socket_path);
    let mcu = SimMcu::new(socket_path);
    tokio::spawn(async move {
        let _ = mcu.run().await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
}

async fn get_motor0_position(host: &mut SimHost, stream: &mut tokio::net::UnixStream, read_buf: &mut Vec<u8>, seq: u8) -> Result<i32> {
    host.send_command(stream, Command::GetStatus, seq).await?;
    let response = host.recv_response(stream, read_buf).await?;
    match response {
        SimResponse::Status { payload, .. } => Ok(i32::from_be_bytes(payload[0..4].try_into().unwrap())),
        other => anyhow::bail!("expected a status response, got {other:?}"),
    }
}

/// A straight-line move along a single axis runs to completion and the
/// reported motor position matches the commanded step count.
#[tokio::test]
async fn straight_line_move_reaches_commanded_position() -> Result<()> {
    let socket_path = "/tmp/sim_straight_line.sock";
    spawn_sim_mcu(socket_path).await;

    let mut host = SimHost::new(socket_path);
    let mut stream = host.connect().await?;
    let mut read_buf = Vec::new();

    let move_10mm = queue_move_for((10.0 * STEPS_PER_UNIT) as i32);
    host.send_command(&mut stream, Command::QueueMove(move_10mm), 1).await?;
    assert_eq!(host.recv_response(&mut stream, &mut read_buf).await?, SimResponse::Ack);

    let position = get_motor0_position(&mut host, &mut stream, &mut read_buf, 2).await?;
    assert_eq!(position, 1000);

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

/// A shorter move at a different rate still lands on exactly its
/// commanded step count, exercising the engine's `steps_remaining`
/// countdown independent of segment duration.
#[tokio::test]
async fn move_advances_exactly_the_requested_step_count() -> Result<()> {
    let socket_path = "/tmp/sim_step_count.sock";
    spawn_sim_mcu(socket_path).await;

    let mut host = SimHost::new(socket_path);
    let mut stream = host.connect().await?;
    let mut read_buf = Vec::new();

    let move_5mm = queue_move_for((5.0 * STEPS_PER_UNIT) as i32);
    host.send_command(&mut stream, Command::QueueMove(move_5mm), 1).await?;
    assert_eq!(host.recv_response(&mut stream, &mut read_buf).await?, SimResponse::Ack);
    let position = get_motor0_position(&mut host, &mut stream, &mut read_buf, 2).await?;
    assert_eq!(position, 500);

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

/// A feedhold issued between two queued segments of one logical move
/// freezes the position at the end of the first segment; the deferred
/// second segment only runs once cycle-start resumes the queue.
#[tokio::test]
async fn feedhold_defers_queued_move_until_cycle_start() -> Result<()> {
    let socket_path = "/tmp/sim_feedhold.sock";
    spawn_sim_mcu(socket_path).await;

    let mut host = SimHost::new(socket_path);
    let mut stream = host.connect().await?;
    let mut read_buf = Vec::new();

    let mut first_half = queue_move_for((5.0 * STEPS_PER_UNIT) as i32);
    first_half.is_end_of_block = false;
    host.send_command(&mut stream, Command::QueueMove(first_half), 1).await?;
    assert_eq!(host.recv_response(&mut stream, &mut read_buf).await?, SimResponse::Ack);

    host.send_command(&mut stream, Command::Feedhold, 2).await?;
    assert_eq!(host.recv_response(&mut stream, &mut read_buf).await?, SimResponse::Ack);

    let second_half = queue_move_for((5.0 * STEPS_PER_UNIT) as i32);
    host.send_command(&mut stream, Command::QueueMove(second_half), 3).await?;
    assert_eq!(host.recv_response(&mut stream, &mut read_buf).await?, SimResponse::Ack);

    let held_position = get_motor0_position(&mut host, &mut stream, &mut read_buf, 4).await?;
    assert_eq!(held_position, 500, "the deferred segment must not run while held");

    host.send_command(&mut stream, Command::CycleStart, 5).await?;
    assert_eq!(host.recv_response(&mut stream, &mut read_buf).await?, SimResponse::Ack);

    let resumed_position = get_motor0_position(&mut host, &mut stream, &mut read_buf, 6).await?;
    assert_eq!(resumed_position, 1000, "cycle-start must drain the deferred segment");

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

/// `ConfigGet`/`ConfigSet` round-trip through the simulated token store,
/// the same surface a real MCU's persisted settings live behind.
#[tokio::test]
async fn config_token_round_trips() -> Result<()> {
    let socket_path = "/tmp/sim_config_token.sock";
    spawn_sim_mcu(socket_path).await;

    let mut host = SimHost::new(socket_path);
    let mut stream = host.connect().await?;
    let mut read_buf = Vec::new();

    let token = mc_proto::commands::ConfigToken::from_str("xvm");
    host.send_command(&mut stream, Command::ConfigSet { token, value: ConfigValue::Float(900.0) }, 1).await?;
    assert_eq!(host.recv_response(&mut stream, &mut read_buf).await?, SimResponse::Ack);

    host.send_command(&mut stream, Command::ConfigGet { token }, 2).await?;
    let response = host.recv_response(&mut stream, &mut read_buf).await?;
    assert_eq!(response, SimResponse::ConfigValue { token: "xvm".to_string(), value: ConfigValue::Float(900.0) });

    let unknown_token = mc_proto::commands::ConfigToken::from_str("zzzz");
    host.send_command(&mut stream, Command::ConfigGet { token: unknown_token }, 3).await?;
    let response = host.recv_response(&mut stream, &mut read_buf).await?;
    assert_eq!(response, SimResponse::Error { code: StatusCode::ValueOutOfRange, external_number: 0 });

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

fn gm_with_feed(feed_rate: f32) -> GCodeState {
    let mut gm = GCodeState::default();
    gm.feed_rate_mode = FeedRateMode::UnitsPerMinute;
    gm.feed_rate = feed_rate;
    gm.motion_mode = MotionMode::G1;
    gm
}

fn test_planner() -> MotionPlanner {
    let mut jerk = [0.0; MAX_AXES];
    let mut feed = [0.0; MAX_AXES];
    let mut steps = [0.0; MAX_AXES];
    for axis in 0..3 {
        jerk[axis] = 100.0;
        feed[axis] = 6000.0;
        steps[axis] = STEPS_PER_UNIT;
    }
    MotionPlanner::new(jerk, feed, steps)
}

/// A 90-degree corner between two queued moves limits the entry velocity
/// of the second move well below its cruise speed, versus a straight
/// continuation which carries through near full speed.
#[test]
fn junction_at_right_angle_limits_entry_velocity() {
    let gm = gm_with_feed(600.0);

    let mut straight = test_planner();
    let origin = [0.0; MAX_AXES];
    let mut leg1 = [0.0; MAX_AXES];
    leg1[0] = 10.0;
    let mut leg2_straight = [0.0; MAX_AXES];
    leg2_straight[0] = 20.0;
    straight.aline(&leg1, &origin, &gm, MoveType::Aligned, 0.1).unwrap();
    straight.aline(&leg2_straight, &leg1, &gm, MoveType::Aligned, 0.1).unwrap();
    while straight.exec().map(|s| !s.is_end_of_block).unwrap_or(false) {}
    let straight_entry = straight.exec().unwrap().start_v;

    let mut cornered = test_planner();
    let mut leg2_turn = leg1;
    leg2_turn[1] = 10.0;
    cornered.aline(&leg1, &origin, &gm, MoveType::Aligned, 0.1).unwrap();
    cornered.aline(&leg2_turn, &leg1, &gm, MoveType::Aligned, 0.1).unwrap();
    while cornered.exec().map(|s| !s.is_end_of_block).unwrap_or(false) {}
    let cornered_entry = cornered.exec().unwrap().start_v;

    assert!(cornered_entry < straight_entry * 0.75, "a 90-degree turn should cut entry velocity well below a straight continuation ({cornered_entry} vs {straight_entry})");
}

/// Switching the active coordinate system changes the machine-space
/// target a given display-space position translates to.
#[test]
fn coordinate_system_switch_changes_translated_target() {
    let mut cm = CanonicalMachine::new();
    cm.coord_offset[1][0] = 0.0; // G54 at machine zero
    cm.coord_offset[2][0] = 50.0; // G55 offset 50mm on X

    cm.gm.coord_system = 1;
    let display_target = [10.0; MAX_AXES];
    let g54_target = cm.translate_target(display_target);
    assert_eq!(g54_target[0], 10.0);

    cm.gm.coord_system = 2;
    let g55_target = cm.translate_target(display_target);
    assert_eq!(g55_target[0], 60.0);
}

/// A target beyond a homed axis's travel maximum is rejected; the same
/// target on an axis that hasn't been homed is allowed through, since
/// soft limits only apply once an axis's zero is known.
#[test]
fn soft_limit_breach_is_rejected_only_on_homed_axes() {
    let mut cm = CanonicalMachine::new();
    cm.axis_limits[0] = motion_core::canonical::AxisLimits { homed: true, travel_min: 0.0, travel_max: 100.0 };

    let mut over_limit = [0.0; MAX_AXES];
    over_limit[0] = 150.0;
    assert_eq!(cm.check_soft_limits(&over_limit), Err((0, true)));

    let mut within_limit = over_limit;
    within_limit[0] = 50.0;
    assert_eq!(cm.check_soft_limits(&within_limit), Ok(()));

    // Axis 1 carries the same out-of-range target but was never homed.
    let mut unhomed_axis_target = [0.0; MAX_AXES];
    unhomed_axis_target[1] = 9999.0;
    assert_eq!(cm.check_soft_limits(&unhomed_axis_target), Ok(()));
}

/// A CoreXY gantry's A/B motors both move for a diagonal XY target, and a
/// pure-X or pure-Y move still drives both motors (by design, since CoreXY
/// couples both belts to both axes).
#[test]
fn corexy_diagonal_move_drives_both_belt_motors() {
    let pass_through = CartesianKinematics::new([0.0, 0.0, 400.0, 0.0, 0.0, 0.0], [-1, -1, 2, -1, -1, -1]);
    let mut kinematics = CoreXyKinematics::new(STEPS_PER_UNIT, pass_through);
    let gm = GCodeState::default();
    let origin = [0.0; MAX_AXES];

    let mut diagonal_target = [0.0; MAX_AXES];
    diagonal_target[0] = 10.0;
    diagonal_target[1] = 10.0;
    let steps = kinematics.inverse_kinematics(&gm, &diagonal_target, &origin, 0.0, 0.0, 1.0);
    // motor A = (x+y)*spu = 2000, motor B = (x-y)*spu = 0
    assert_eq!(steps[0], 2000);
    assert_eq!(steps[1], 0);

    let mut pure_x_target = [0.0; MAX_AXES];
    pure_x_target[0] = 10.0;
    let steps_x = kinematics.inverse_kinematics(&gm, &pure_x_target, &origin, 0.0, 0.0, 1.0);
    assert_eq!(steps_x[0], 1000);
    assert_eq!(steps_x[1], 1000);
}
