//! Kinematics: the bidirectional map between Cartesian axes and motor steps.
//!
//! Generalizes the `Kinematics` trait (originally a single
//! `cartesian_to_stepper_positions` over a fixed Cartesian/CoreXY pair) into
//! the four variants a canonical machine may be configured with, selected at
//! init time rather than through dynamic dispatch.

#[cfg(not(feature = "std"))]
use libm::sqrtf;
#[cfg(feature = "std")]
fn sqrtf(v: f32) -> f32 {
    v.sqrt()
}

use crate::canonical::GCodeState;
use crate::MAX_AXES;
use servo_loops::Pid;

/// Number of physical motors a kinematics variant may drive.
pub const MAX_MOTORS: usize = 6;

/// Optional encoder-compensation hook. Left unpopulated unless a
/// configuration flag enables it; the simple forward/inverse math never
/// reads it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderFeedback {
    pub enabled: bool,
    pub measured_steps: [i32; MAX_MOTORS],
}

/// A trait for kinematic models that translate canonical-machine targets to
/// motor step positions.
///
/// `inverse_kinematics` is called once per prepared segment: it must be
/// deterministic for a fixed configuration, produce step values that
/// include any configured `motor_offset`, and may advance kinematics-internal
/// state (e.g. the four-cable/pressure idle loops) forward in time.
pub trait Kinematics {
    /// Maximum number of motors this variant drives.
    fn motor_count(&self) -> usize;

    /// Maps a target position (plus the entry/exit velocities and the
    /// segment's planned duration, which pressure/tension-feedback variants
    /// use to drive their corrective loop) to motor step counts.
    fn inverse_kinematics(
        &mut self,
        gm: &GCodeState,
        target: &[f32; MAX_AXES],
        position: &[f32; MAX_AXES],
        start_v: f32,
        end_v: f32,
        segment_time: f32,
    ) -> [i32; MAX_MOTORS];

    /// Maps motor step counts back to a position. Must invert
    /// `inverse_kinematics` to within one step, for a fixed configuration.
    fn forward_kinematics(&self, steps: &[i32; MAX_MOTORS]) -> [f32; MAX_AXES];

    /// Recomputes internal offsets after a steps-per-unit or motor-map change.
    fn configure(&mut self, steps_per_unit: &[f32; MAX_MOTORS], motor_map: &[i8; MAX_MOTORS]);

    /// Resets offsets so the currently-held axis position will, on the next
    /// `inverse_kinematics` call, produce exactly the given step position.
    fn sync_encoders(&mut self, step_position: &[i32; MAX_MOTORS], position: &[f32; MAX_AXES]);

    /// Invoked when the planner buffer empties. Non-cartesian kinematics may
    /// return a corrective sub-segment (delta steps per motor) to inject.
    fn idle_task(&mut self) -> Option<[i32; MAX_MOTORS]> {
        None
    }
}

// --- Cartesian Kinematics ---

/// Each motor maps to exactly one axis: `steps[m] = target[axis] * steps_per_unit[m] + motor_offset[m]`.
/// `motor_map[m] == -1` means the motor is unused.
#[derive(Debug, Default, Clone, Copy)]
pub struct CartesianKinematics {
    pub steps_per_unit: [f32; MAX_MOTORS],
    pub motor_map: [i8; MAX_MOTORS],
    pub motor_offset: [f32; MAX_MOTORS],
}

impl CartesianKinematics {
    pub fn new(steps_per_unit: [f32; MAX_MOTORS], motor_map: [i8; MAX_MOTORS]) -> Self {
        Self {
            steps_per_unit,
            motor_map,
            motor_offset: [0.0; MAX_MOTORS],
        }
    }

    /// Among motors sharing an axis, the one with the largest `steps_per_unit`
    /// provides the reported position (best precision).
    fn best_motor_for_axis(&self, axis: usize) -> Option<usize> {
        let mut best: Option<usize> = None;
        for m in 0..MAX_MOTORS {
            if self.motor_map[m] >= 0 && self.motor_map[m] as usize == axis {
                match best {
                    Some(b) if self.steps_per_unit[b] >= self.steps_per_unit[m] => {}
                    _ => best = Some(m),
                }
            }
        }
        best
    }
}

impl Kinematics for CartesianKinematics {
    fn motor_count(&self) -> usize {
        MAX_MOTORS
    }

    fn inverse_kinematics(
        &mut self,
        _gm: &GCodeState,
        target: &[f32; MAX_AXES],
        _position: &[f32; MAX_AXES],
        _start_v: f32,
        _end_v: f32,
        _segment_time: f32,
    ) -> [i32; MAX_MOTORS] {
        let mut steps = [0i32; MAX_MOTORS];
        for m in 0..MAX_MOTORS {
            let map = self.motor_map[m];
            if map < 0 {
                continue;
            }
            let axis = map as usize;
            steps[m] = (target[axis] * self.steps_per_unit[m] + self.motor_offset[m]).round() as i32;
        }
        steps
    }

    fn forward_kinematics(&self, steps: &[i32; MAX_MOTORS]) -> [f32; MAX_AXES] {
        let mut position = [0.0; MAX_AXES];
        for axis in 0..MAX_AXES {
            if let Some(m) = self.best_motor_for_axis(axis) {
                if self.steps_per_unit[m] != 0.0 {
                    position[axis] = (steps[m] as f32 - self.motor_offset[m]) / self.steps_per_unit[m];
                }
            }
        }
        position
    }

    fn configure(&mut self, steps_per_unit: &[f32; MAX_MOTORS], motor_map: &[i8; MAX_MOTORS]) {
        self.steps_per_unit = *steps_per_unit;
        self.motor_map = *motor_map;
        // motor_offset is left untouched: a steps-per-unit rescale with no
        // live step position to anchor to is a no-op translation.
    }

    fn sync_encoders(&mut self, step_position: &[i32; MAX_MOTORS], position: &[f32; MAX_AXES]) {
        for m in 0..MAX_MOTORS {
            let map = self.motor_map[m];
            if map < 0 {
                continue;
            }
            let axis = map as usize;
            self.motor_offset[m] = step_position[m] as f32 - position[axis] * self.steps_per_unit[m];
        }
    }
}

// --- CoreXY Kinematics ---

/// X and Y share a belt pair: joint target for motor A is `X + Y`, for motor
/// B is `X - Y`. Other axes (Z, ...) pass through motors mapped 1:1.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreXyKinematics {
    /// Motor indices 0 and 1 are the A and B belt motors; motors 2.. pass
    /// through like Cartesian, indexed by the pass-through's own motor_map.
    pub steps_per_unit_ab: f32,
    pub pass_through: CartesianKinematics,
    pub motor_offset_ab: [f32; 2],
}

impl CoreXyKinematics {
    pub fn new(steps_per_unit_ab: f32, pass_through: CartesianKinematics) -> Self {
        Self {
            steps_per_unit_ab,
            pass_through,
            motor_offset_ab: [0.0; 2],
        }
    }
}

impl Kinematics for CoreXyKinematics {
    fn motor_count(&self) -> usize {
        MAX_MOTORS
    }

    fn inverse_kinematics(
        &mut self,
        gm: &GCodeState,
        target: &[f32; MAX_AXES],
        position: &[f32; MAX_AXES],
        start_v: f32,
        end_v: f32,
        segment_time: f32,
    ) -> [i32; MAX_MOTORS] {
        let mut steps = self
            .pass_through
            .inverse_kinematics(gm, target, position, start_v, end_v, segment_time);
        let x = target[0];
        let y = target[1];
        steps[0] = ((x + y) * self.steps_per_unit_ab + self.motor_offset_ab[0]).round() as i32;
        steps[1] = ((x - y) * self.steps_per_unit_ab + self.motor_offset_ab[1]).round() as i32;
        steps
    }

    fn forward_kinematics(&self, steps: &[i32; MAX_MOTORS]) -> [f32; MAX_AXES] {
        let mut position = self.pass_through.forward_kinematics(steps);
        let a = steps[0] as f32 - self.motor_offset_ab[0];
        let b = steps[1] as f32 - self.motor_offset_ab[1];
        if self.steps_per_unit_ab != 0.0 {
            position[0] = (a + b) / (2.0 * self.steps_per_unit_ab);
            position[1] = (a - b) / (2.0 * self.steps_per_unit_ab);
        }
        position
    }

    fn configure(&mut self, steps_per_unit: &[f32; MAX_MOTORS], motor_map: &[i8; MAX_MOTORS]) {
        self.pass_through.configure(steps_per_unit, motor_map);
        // A and B must share velocity/accel/jerk settings; steps_per_unit for
        // both is taken from motor 0 (A) by convention.
        self.steps_per_unit_ab = steps_per_unit[0];
    }

    fn sync_encoders(&mut self, step_position: &[i32; MAX_MOTORS], position: &[f32; MAX_AXES]) {
        self.pass_through.sync_encoders(step_position, position);
        let x = position[0];
        let y = position[1];
        self.motor_offset_ab[0] = step_position[0] as f32 - (x + y) * self.steps_per_unit_ab;
        self.motor_offset_ab[1] = step_position[1] as f32 - (x - y) * self.steps_per_unit_ab;
    }
}

// --- Four-cable Kinematics ---

/// Four anchor points in a rectangle; each joint is a cable length from a
/// body-fixed point (offset by target XY) to the anchor.
#[derive(Debug, Clone, Copy)]
pub struct FourCableKinematics {
    pub anchors: [[f32; 2]; 4],
    pub steps_per_unit: [f32; 4],
    pub motor_offset: [f32; 4],
    pub z_offset_correction_enabled: bool,
    pub encoder_feedback: Option<EncoderFeedback>,
    /// Normalized tension error per cable: -1 is zero tension, +1 is max
    /// tension, 0 is the target ("goldilocks") load. Updated by the caller
    /// from the four tension sensors before each `idle_task` call.
    pub sensor_value: [f32; 4],
    /// Per-cable jerk-limited idle-loop state: velocity and acceleration of
    /// the corrective motion, integrated from the change in `sensor_value`.
    cable_vel: [f32; 4],
    cable_accel: [f32; 4],
    prev_sensor_value: [f32; 4],
    /// Jerk fed into the idle loop per unit of sensor-value change per
    /// idle-loop iteration, analogous to `jerk_high * JERK_MULTIPLIER`.
    pub jerk_max: f32,
    /// Static-friction loss fraction and its velocity midpoint, damping the
    /// idle loop's velocity each iteration.
    pub friction: f32,
    pub friction_midpoint: f32,
    pub velocity_max: f32,
    /// Idle-loop iteration period, in the same units as `jerk_max`'s time base.
    pub idle_segment_time: f32,
    is_anchored: bool,
    last_segment_was_idle: bool,
}

impl Default for FourCableKinematics {
    fn default() -> Self {
        Self {
            anchors: [[0.0, 0.0]; 4],
            steps_per_unit: [1.0; 4],
            motor_offset: [0.0; 4],
            z_offset_correction_enabled: false,
            encoder_feedback: None,
            sensor_value: [0.0; 4],
            cable_vel: [0.0; 4],
            cable_accel: [0.0; 4],
            prev_sensor_value: [0.0; 4],
            jerk_max: 1.0,
            friction: 0.1,
            friction_midpoint: 5.0,
            velocity_max: 500.0,
            idle_segment_time: 1.0 / 60_000.0,
            is_anchored: false,
            last_segment_was_idle: false,
        }
    }
}

impl FourCableKinematics {
    /// Marks the gantry as anchored to an active move: the idle loop is
    /// suppressed and its state resets the next time it becomes idle, the
    /// way the original clears `cable_vel`/`cable_accel` on the first idle
    /// segment after a run of real motion.
    pub fn set_anchored(&mut self, anchored: bool) {
        self.is_anchored = anchored;
    }
}

impl FourCableKinematics {
    fn cable_length(&self, anchor: [f32; 2], target_xy: [f32; 2]) -> f32 {
        let dx = anchor[0] - target_xy[0];
        let dy = anchor[1] - target_xy[1];
        // The planar assumption skips the z-offset correction term unless
        // explicitly enabled: a non-planar cable run would add a
        // z-dependent length term here.
        let _ = self.z_offset_correction_enabled;
        sqrtf(dx * dx + dy * dy)
    }
}

impl Kinematics for FourCableKinematics {
    fn motor_count(&self) -> usize {
        4
    }

    fn inverse_kinematics(
        &mut self,
        _gm: &GCodeState,
        target: &[f32; MAX_AXES],
        _position: &[f32; MAX_AXES],
        _start_v: f32,
        _end_v: f32,
        _segment_time: f32,
    ) -> [i32; MAX_MOTORS] {
        let xy = [target[0], target[1]];
        let mut steps = [0i32; MAX_MOTORS];
        for i in 0..4 {
            let length = self.cable_length(self.anchors[i], xy);
            steps[i] = (length * self.steps_per_unit[i] + self.motor_offset[i]).round() as i32;
        }
        steps
    }

    fn forward_kinematics(&self, steps: &[i32; MAX_MOTORS]) -> [f32; MAX_AXES] {
        // A full forward solve requires trilateration across all four
        // cables; the front pair (0, 1) is used as the primary solve, with
        // the remaining two left as a consistency check for the caller.
        let mut position = [0.0; MAX_AXES];
        let l0 = (steps[0] as f32 - self.motor_offset[0]) / self.steps_per_unit[0].max(f32::EPSILON);
        let l1 = (steps[1] as f32 - self.motor_offset[1]) / self.steps_per_unit[1].max(f32::EPSILON);
        let (x0, y0) = (self.anchors[0][0], self.anchors[0][1]);
        let (x1, y1) = (self.anchors[1][0], self.anchors[1][1]);
        let d = sqrtf((x1 - x0) * (x1 - x0) + (y1 - y0) * (y1 - y0));
        if d > f32::EPSILON {
            let a = (l0 * l0 - l1 * l1 + d * d) / (2.0 * d);
            let h_sq = l0 * l0 - a * a;
            let h = if h_sq > 0.0 { sqrtf(h_sq) } else { 0.0 };
            let ux = (x1 - x0) / d;
            let uy = (y1 - y0) / d;
            // Perpendicular direction chosen so the solved point lies below
            // the anchor bar, matching the gantry's physical work area.
            position[0] = x0 + a * ux + h * uy;
            position[1] = y0 + a * uy - h * ux;
        }
        position
    }

    fn configure(&mut self, steps_per_unit: &[f32; MAX_MOTORS], _motor_map: &[i8; MAX_MOTORS]) {
        for i in 0..4 {
            self.steps_per_unit[i] = steps_per_unit[i];
        }
    }

    fn sync_encoders(&mut self, step_position: &[i32; MAX_MOTORS], position: &[f32; MAX_AXES]) {
        let xy = [position[0], position[1]];
        for i in 0..4 {
            let length = self.cable_length(self.anchors[i], xy);
            self.motor_offset[i] = step_position[i] as f32 - length * self.steps_per_unit[i];
        }
    }

    fn idle_task(&mut self) -> Option<[i32; MAX_MOTORS]> {
        // Per-cable idle loop: jerk is driven directly by the change in
        // normalized tension error since the last reading, then integrated
        // through acceleration and velocity with a static-friction damping
        // term, the way the four-cable gantry's corrective motion tracks
        // its tension sensors while parked.
        if self.is_anchored {
            return None;
        }

        if !self.last_segment_was_idle {
            self.cable_vel = [0.0; 4];
            self.cable_accel = [0.0; 4];
            self.prev_sensor_value = self.sensor_value;
        }
        self.last_segment_was_idle = true;

        let dt = self.idle_segment_time;
        let mut delta = [0i32; MAX_MOTORS];
        let mut any = false;
        for i in 0..4 {
            let sensor_diff = self.sensor_value[i] - self.prev_sensor_value[i];
            self.prev_sensor_value[i] = self.sensor_value[i];

            let jerk = sensor_diff * self.jerk_max;
            self.cable_accel[i] += jerk * dt;

            let friction_loss = (self.friction * self.friction_midpoint) / (self.cable_vel[i].abs() + self.friction_midpoint);
            self.cable_vel[i] -= self.cable_vel[i] * friction_loss;
            self.cable_vel[i] += self.cable_accel[i] * dt;
            self.cable_vel[i] = self.cable_vel[i].clamp(-self.velocity_max, self.velocity_max);

            let step_delta = (self.cable_vel[i] * dt * self.steps_per_unit[i]).round() as i32;
            if step_delta != 0 {
                delta[i] = step_delta;
                any = true;
            }
        }
        any.then_some(delta)
    }
}

// --- Pressure-regulated Kinematics ---

/// Joint position is driven by a single pressure sensor relative to a
/// target reading; a PID loop, bounded to `max_idle_step_delta`, produces
/// the idle-loop corrective motion — this is the one kinematics variant the
/// spec calls out as genuinely "PID-like", unlike four-cable's jerk-driven
/// tracking.
#[derive(Debug, Clone, Copy)]
pub struct PressureKinematics {
    pub steps_per_unit: f32,
    pub motor_offset: f32,
    pub sensor_reading: f32,
    pid: Pid<f32>,
    /// Idle-loop iteration period fed to the PID controller as `dt`.
    pub idle_segment_time: f32,
}

impl Default for PressureKinematics {
    fn default() -> Self {
        Self {
            steps_per_unit: 1.0,
            motor_offset: 0.0,
            sensor_reading: 0.0,
            pid: Pid::new(0.05, 0.0, 0.0, 0.0, -50.0, 50.0),
            idle_segment_time: 1.0 / 60_000.0,
        }
    }
}

impl PressureKinematics {
    /// The pressure reading the idle loop tracks.
    pub fn sensor_zero_target(&self) -> f32 {
        self.pid.setpoint
    }

    pub fn set_sensor_zero_target(&mut self, target: f32) {
        self.pid.setpoint = target;
    }

    /// Bounds on the per-iteration corrective step delta, in steps.
    pub fn set_idle_step_limits(&mut self, max_idle_step_delta: i32) {
        self.pid.output_max = max_idle_step_delta as f32;
        self.pid.output_min = -(max_idle_step_delta as f32);
    }
}

impl Kinematics for PressureKinematics {
    fn motor_count(&self) -> usize {
        1
    }

    fn inverse_kinematics(
        &mut self,
        _gm: &GCodeState,
        target: &[f32; MAX_AXES],
        _position: &[f32; MAX_AXES],
        _start_v: f32,
        _end_v: f32,
        _segment_time: f32,
    ) -> [i32; MAX_MOTORS] {
        let mut steps = [0i32; MAX_MOTORS];
        steps[0] = (target[0] * self.steps_per_unit + self.motor_offset).round() as i32;
        steps
    }

    fn forward_kinematics(&self, steps: &[i32; MAX_MOTORS]) -> [f32; MAX_AXES] {
        let mut position = [0.0; MAX_AXES];
        if self.steps_per_unit != 0.0 {
            position[0] = (steps[0] as f32 - self.motor_offset) / self.steps_per_unit;
        }
        position
    }

    fn configure(&mut self, steps_per_unit: &[f32; MAX_MOTORS], _motor_map: &[i8; MAX_MOTORS]) {
        self.steps_per_unit = steps_per_unit[0];
    }

    fn sync_encoders(&mut self, step_position: &[i32; MAX_MOTORS], position: &[f32; MAX_AXES]) {
        self.motor_offset = step_position[0] as f32 - position[0] * self.steps_per_unit;
    }

    fn idle_task(&mut self) -> Option<[i32; MAX_MOTORS]> {
        let error = self.pid.setpoint - self.sensor_reading;
        if error.abs() <= f32::EPSILON {
            return None;
        }
        let raw = self.pid.update(self.sensor_reading, self.idle_segment_time).round() as i32;
        if raw == 0 {
            return None;
        }
        let mut delta = [0i32; MAX_MOTORS];
        delta[0] = raw;
        Some(delta)
    }
}
