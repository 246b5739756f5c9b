//! Ring-buffer motion planner: back/forward look-ahead velocity planning
//! with jerk-limited S-curve segments.
//!
//! Generalizes the teacher's `MotionPlanner` (there: a `heapless::Deque`
//! lookahead queue over a fixed 8-axis `MoveSegment`, feeding a
//! `heapless::spsc::Queue` of finalized segments) into the array-of-N-blocks
//! ring buffer the design notes call for (§9: "implement as an array of N
//! blocks with u32 head/tail indices and per-block state — no raw cycles"),
//! and widens the S-curve timing math (`t_j1..t_j4`, jerk-limited
//! head/body/tail) from the teacher's `recalculate_timing`/
//! `get_velocity_and_accel` to the block-level entry/cruise/exit velocity
//! triple the canonical machine now owns.

#[cfg(not(feature = "std"))]
use libm::{fabsf, fmaxf, fminf, sqrtf};
#[cfg(feature = "std")]
fn fabsf(v: f32) -> f32 {
    v.abs()
}
#[cfg(feature = "std")]
fn fmaxf(a: f32, b: f32) -> f32 {
    a.max(b)
}
#[cfg(feature = "std")]
fn fminf(a: f32, b: f32) -> f32 {
    a.min(b)
}
#[cfg(feature = "std")]
fn sqrtf(v: f32) -> f32 {
    v.sqrt()
}

use crate::canonical::GCodeState;
use crate::errors::PlannerError;
use crate::MAX_AXES;

/// Number of blocks in the ring buffer.
pub const PLANNER_BUFFER_SIZE: usize = 32;
/// Lower bound on any prepared segment's duration, in minutes (1/1000 min = 60ms).
pub const MIN_SEGMENT_TIME: f32 = 1.0 / 1000.0;
/// Jerk is stored divided by this for UI convenience; multiplied back in
/// when used as an acceleration-rate-of-change limit.
pub const JERK_MULTIPLIER: f32 = 1.0e6;
/// Reject an `aline` whose length is below this many mm (or equivalent units).
pub const MIN_MOVE_LENGTH: f32 = 1.0e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockState {
    #[default]
    Empty,
    Loading,
    Queued,
    Running,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveType {
    #[default]
    Aligned,
    Traverse,
    Arc,
    Dwell,
    Command,
    Stop,
    End,
}

/// Tag identifying a queued command's effect; dispatched by the caller that
/// owns the canonical machine and toolheads, with two small float
/// parameters carried alongside (matching the spec's "two small parameter
/// vectors for queued commands").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandKind {
    #[default]
    None,
    ProgramEnd,
    SpindleEngage,
    CoordSystemChange,
    ToolChange,
    CoolantOn,
    CoolantOff,
}

#[derive(Debug, Clone, Copy)]
pub struct PlannerBlock {
    pub length: f32,
    pub unit_vector: [f32; MAX_AXES],
    pub entry_velocity: f32,
    pub cruise_velocity: f32,
    pub exit_velocity: f32,
    pub entry_vmax: f32,
    pub cruise_vmax: f32,
    pub exit_vmax: f32,
    pub junction_vmax: f32,
    pub delta_vmax: f32,
    pub jerk: f32,
    pub jerk_sq: f32,
    pub recip_jerk: f32,
    pub accel_max: f32,
    pub move_time: f32,
    pub head_length: f32,
    pub body_length: f32,
    pub tail_length: f32,
    pub t_j1: f32,
    pub t_a: f32,
    pub t_j2: f32,
    pub t_c: f32,
    pub t_j3: f32,
    pub t_d: f32,
    pub t_j4: f32,
    pub move_type: MoveType,
    pub gm: GCodeState,
    pub state: BlockState,
    pub command: CommandKind,
    pub command_args: [f32; 2],
    /// Elapsed time (minutes) consumed by `exec` within this block.
    pub phase_cursor: f32,
}

impl Default for PlannerBlock {
    fn default() -> Self {
        Self {
            length: 0.0,
            unit_vector: [0.0; MAX_AXES],
            entry_velocity: 0.0,
            cruise_velocity: 0.0,
            exit_velocity: 0.0,
            entry_vmax: 0.0,
            cruise_vmax: 0.0,
            exit_vmax: 0.0,
            junction_vmax: 0.0,
            delta_vmax: 0.0,
            jerk: 0.0,
            jerk_sq: 0.0,
            recip_jerk: 0.0,
            accel_max: 0.0,
            move_time: 0.0,
            head_length: 0.0,
            body_length: 0.0,
            tail_length: 0.0,
            t_j1: 0.0,
            t_a: 0.0,
            t_j2: 0.0,
            t_c: 0.0,
            t_j3: 0.0,
            t_d: 0.0,
            t_j4: 0.0,
            move_type: MoveType::default(),
            gm: GCodeState::default(),
            state: BlockState::default(),
            command: CommandKind::default(),
            command_args: [0.0; 2],
            phase_cursor: 0.0,
        }
    }
}

/// One `MIN_SEGMENT_TIME`-bounded slice of a running block, ready for
/// kinematics to translate into motor steps and `dda-stepper` to pulse out.
#[derive(Debug, Clone, Copy)]
pub struct ExecSegment {
    pub move_type: MoveType,
    pub gm: GCodeState,
    pub unit_vector: [f32; MAX_AXES],
    pub start_v: f32,
    pub end_v: f32,
    pub distance: f32,
    pub duration_min: f32,
    pub is_end_of_block: bool,
    pub command: CommandKind,
    pub command_args: [f32; 2],
}

/// Ring buffer of `PLANNER_BUFFER_SIZE` blocks plus head/tail indices.
/// `tail` is the oldest (running or about-to-run) block; `head` is the next
/// free slot. Back-planning traverses from `head` backward to `tail`,
/// stopping at the first running block.
pub struct MotionPlanner {
    blocks: [PlannerBlock; PLANNER_BUFFER_SIZE],
    head: usize,
    tail: usize,
    count: usize,
    runnable_count: usize,
    steps_per_unit_max: [f32; MAX_AXES],
    axis_jerk_max: [f32; MAX_AXES],
    axis_feedrate_max: [f32; MAX_AXES],
}

impl MotionPlanner {
    pub fn new(axis_jerk_max: [f32; MAX_AXES], axis_feedrate_max: [f32; MAX_AXES], steps_per_unit_max: [f32; MAX_AXES]) -> Self {
        Self {
            blocks: [PlannerBlock::default(); PLANNER_BUFFER_SIZE],
            head: 0,
            tail: 0,
            count: 0,
            runnable_count: 0,
            steps_per_unit_max,
            axis_jerk_max,
            axis_feedrate_max,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == PLANNER_BUFFER_SIZE
    }

    /// `mp_has_runnable_buffer()`: whether any non-empty block remains.
    pub fn has_runnable_buffer(&self) -> bool {
        self.runnable_count > 0
    }

    fn next_index(&self, i: usize) -> usize {
        (i + 1) % PLANNER_BUFFER_SIZE
    }

    fn prev_index(&self, i: usize) -> usize {
        (i + PLANNER_BUFFER_SIZE - 1) % PLANNER_BUFFER_SIZE
    }

    /// Index of the most recently loaded block, if any.
    fn newest_index(&self) -> Option<usize> {
        if self.count == 0 {
            None
        } else {
            Some(self.prev_index(self.head))
        }
    }

    /// Queues a straight-line move from `position` to `target`. Computes
    /// length and unit vector, rejects sub-minimum-length moves, derives
    /// `cruise_vmax`, runs the junction-velocity computation against the
    /// previous block, then back-plans.
    pub fn aline(
        &mut self,
        target: &[f32; MAX_AXES],
        position: &[f32; MAX_AXES],
        gm: &GCodeState,
        move_type: MoveType,
        junction_integration_time: f32,
    ) -> Result<(), PlannerError> {
        if self.is_full() {
            return Err(PlannerError::QueueFull);
        }

        let mut unit_vector = [0.0f32; MAX_AXES];
        let mut length_sq = 0.0f32;
        for axis in 0..MAX_AXES {
            let delta = target[axis] - position[axis];
            unit_vector[axis] = delta;
            length_sq += delta * delta;
        }
        let length = sqrtf(length_sq);
        if length < MIN_MOVE_LENGTH {
            return Err(PlannerError::MinimumLengthMove);
        }
        for axis in 0..MAX_AXES {
            unit_vector[axis] /= length;
        }

        let cruise_vmax = self.compute_cruise_vmax(gm, &unit_vector, length)?;
        let (jerk, accel_max) = self.compute_jerk_and_accel(&unit_vector);

        let mut block = PlannerBlock {
            length,
            unit_vector,
            entry_velocity: 0.0,
            cruise_velocity: cruise_vmax,
            exit_velocity: 0.0,
            entry_vmax: 0.0,
            cruise_vmax,
            exit_vmax: cruise_vmax,
            junction_vmax: cruise_vmax,
            delta_vmax: sqrtf(2.0 * accel_max * length),
            jerk,
            jerk_sq: jerk * jerk,
            recip_jerk: if jerk > 0.0 { 1.0 / jerk } else { 0.0 },
            accel_max,
            move_type,
            gm: *gm,
            state: BlockState::Loading,
            ..Default::default()
        };

        if let Some(prev_idx) = self.newest_index() {
            let prev = self.blocks[prev_idx];
            let junction_vmax = self.junction_velocity(&prev, &block, junction_integration_time);
            block.junction_vmax = fminf(junction_vmax, fminf(prev.cruise_vmax, block.cruise_vmax));
        }

        let idx = self.head;
        self.blocks[idx] = block;
        self.blocks[idx].state = BlockState::Queued;
        self.head = self.next_index(self.head);
        self.count += 1;
        self.runnable_count += 1;

        self.back_plan();
        Ok(())
    }

    /// Queues a non-motion command block (dwell, M-code callback,
    /// coordinate-system change, spindle engage). Consumes no step time;
    /// `exec` dispatches it between the completion of the preceding block
    /// and the start of the next.
    pub fn queue_command(&mut self, gm: &GCodeState, command: CommandKind, args: [f32; 2]) -> Result<(), PlannerError> {
        if self.is_full() {
            return Err(PlannerError::QueueFull);
        }
        let idx = self.head;
        self.blocks[idx] = PlannerBlock {
            move_type: MoveType::Command,
            gm: *gm,
            state: BlockState::Queued,
            command,
            command_args: args,
            cruise_velocity: 0.0,
            move_time: args[0].max(0.0),
            ..Default::default()
        };
        self.head = self.next_index(self.head);
        self.count += 1;
        self.runnable_count += 1;
        Ok(())
    }

    fn compute_cruise_vmax(&self, gm: &GCodeState, unit_vector: &[f32; MAX_AXES], length: f32) -> Result<f32, PlannerError> {
        use crate::canonical::FeedRateMode;
        let mut vmax = match gm.feed_rate_mode {
            FeedRateMode::InverseTime => {
                if gm.feed_rate <= 0.0 {
                    return Err(PlannerError::FeedRateNotSpecified);
                }
                length / gm.feed_rate
            }
            FeedRateMode::UnitsPerMinute | FeedRateMode::UnitsPerRev => {
                if gm.feed_rate <= 0.0 {
                    return Err(PlannerError::FeedRateNotSpecified);
                }
                gm.feed_rate
            }
        };

        // Clamp to each axis's feedrate cap, projected along the unit vector.
        for axis in 0..MAX_AXES {
            let component = fabsf(unit_vector[axis]);
            if component > 1e-6 && self.axis_feedrate_max[axis] > 0.0 {
                let axis_cap = self.axis_feedrate_max[axis] / component;
                vmax = fminf(vmax, axis_cap);
            }
        }
        Ok(vmax)
    }

    fn compute_jerk_and_accel(&self, unit_vector: &[f32; MAX_AXES]) -> (f32, f32) {
        let mut jerk = f32::MAX;
        for axis in 0..MAX_AXES {
            let component = fabsf(unit_vector[axis]);
            if component > 1e-6 && self.axis_jerk_max[axis] > 0.0 {
                let axis_jerk = (self.axis_jerk_max[axis] * JERK_MULTIPLIER) / component;
                jerk = fminf(jerk, axis_jerk);
            }
        }
        if jerk == f32::MAX {
            jerk = 0.0;
        }
        // A conservative accel bound derived from jerk over one
        // `junction_integration_time`-scale ramp; refined per-block by the
        // canonical machine's `max_junction_accel` when jerk changes.
        let accel_max = sqrtf(jerk.max(0.0)) * 10.0;
        (jerk, accel_max)
    }

    /// `junction_vmax = sqrt(junction_accel * R)`, `R` derived from the
    /// angle between unit vectors and `junction_integration_time`. Tie-broken
    /// to zero when the path reverses (dot <= -0.99).
    fn junction_velocity(&self, prev: &PlannerBlock, next: &PlannerBlock, junction_integration_time: f32) -> f32 {
        let mut raw_dot = 0.0f32;
        for axis in 0..MAX_AXES {
            raw_dot += prev.unit_vector[axis] * next.unit_vector[axis];
        }
        if raw_dot <= -0.99 {
            return 0.0;
        }
        let cos_theta = fminf(fmaxf(-raw_dot, -0.999999), 0.999999);
        let sin_half = sqrtf(fmaxf((1.0 - cos_theta) / 2.0, 0.0));
        let denom = fmaxf(1.0 - sin_half, 1.0e-6);
        let junction_accel = fminf(prev.accel_max, next.accel_max);
        let t = if junction_integration_time > 0.0 { junction_integration_time } else { 0.1 };
        let radius = t * sin_half / denom;
        sqrtf(fmaxf(junction_accel * radius, 0.0))
    }

    /// Back-plans from the newest block toward the oldest, propagating
    /// `entry_vmax <- min(cruise_vmax, junction_vmax_with_previous,
    /// previous.exit_vmax + delta_vmax)`. Stops at the first running block.
    fn back_plan(&mut self) {
        if self.count == 0 {
            return;
        }
        let mut idx = self.prev_index(self.head);
        let mut next_entry_vmax: Option<f32> = None;

        loop {
            if self.blocks[idx].state == BlockState::Running {
                break;
            }
            let prev_exit_vmax = if idx == self.tail {
                0.0
            } else {
                self.blocks[self.prev_index(idx)].exit_vmax
            };

            let mut entry_vmax = fminf(self.blocks[idx].cruise_vmax, self.blocks[idx].junction_vmax);
            entry_vmax = fminf(entry_vmax, prev_exit_vmax + self.blocks[idx].delta_vmax);
            if let Some(cap) = next_entry_vmax {
                entry_vmax = fminf(entry_vmax, cap + self.blocks[idx].delta_vmax);
            }

            let stable = (self.blocks[idx].entry_vmax - entry_vmax).abs() < 1e-6 && self.blocks[idx].state != BlockState::Loading;
            self.blocks[idx].entry_vmax = entry_vmax;
            self.blocks[idx].exit_vmax = fminf(self.blocks[idx].cruise_vmax, entry_vmax + self.blocks[idx].delta_vmax);
            self.blocks[idx].entry_velocity = entry_vmax;
            self.blocks[idx].exit_velocity = self.blocks[idx].exit_vmax;

            next_entry_vmax = Some(self.blocks[idx].entry_vmax);

            if idx == self.tail || stable {
                break;
            }
            idx = self.prev_index(idx);
        }
    }

    /// Forward-plans the block at `tail` (the next to run), deciding which
    /// of head/body/tail phases exist and their durations: constant-jerk
    /// head and tail, constant-velocity body.
    fn forward_plan(block: &mut PlannerBlock) {
        if block.move_type != MoveType::Aligned && block.move_type != MoveType::Traverse && block.move_type != MoveType::Arc {
            return;
        }
        let accel_dist = (block.cruise_velocity * block.cruise_velocity - block.entry_velocity * block.entry_velocity) / (2.0 * block.accel_max.max(1e-6));
        let decel_dist = (block.cruise_velocity * block.cruise_velocity - block.exit_velocity * block.exit_velocity) / (2.0 * block.accel_max.max(1e-6));

        if accel_dist + decel_dist > block.length {
            block.cruise_velocity = sqrtf(fmaxf(
                (2.0 * block.accel_max * block.length + block.entry_velocity * block.entry_velocity + block.exit_velocity * block.exit_velocity) / 2.0,
                0.0,
            ));
            block.body_length = 0.0;
        } else {
            block.body_length = block.length - accel_dist - decel_dist;
        }

        let accel_time = fabsf(block.cruise_velocity - block.entry_velocity) / block.accel_max.max(1e-6);
        let decel_time = fabsf(block.cruise_velocity - block.exit_velocity) / block.accel_max.max(1e-6);

        block.t_j1 = fminf(accel_time / 2.0, block.accel_max * block.recip_jerk);
        block.t_a = fmaxf(accel_time - 2.0 * block.t_j1, 0.0);
        block.t_j2 = block.t_j1;
        block.t_c = if block.cruise_velocity > 0.0 { block.body_length / block.cruise_velocity } else { 0.0 };
        block.t_j3 = fminf(decel_time / 2.0, block.accel_max * block.recip_jerk);
        block.t_d = fmaxf(decel_time - 2.0 * block.t_j3, 0.0);
        block.t_j4 = block.t_j3;

        block.head_length = accel_dist;
        block.tail_length = decel_dist;
        block.move_time = block.t_j1 + block.t_a + block.t_j2 + block.t_c + block.t_j3 + block.t_d + block.t_j4;
    }

    fn velocity_at(block: &PlannerBlock, t: f32) -> f32 {
        let j = block.jerk;
        let t1 = block.t_j1;
        let t2 = t1 + block.t_a;
        let t3 = t2 + block.t_j2;
        let t4 = t3 + block.t_c;
        let t5 = t4 + block.t_j3;
        let t6 = t5 + block.t_d;

        if t < t1 {
            block.entry_velocity + 0.5 * j * t * t
        } else if t < t2 {
            block.entry_velocity + 0.5 * j * t1 * t1 + block.accel_max * (t - t1)
        } else if t < t3 {
            let dt = t3 - t;
            block.cruise_velocity - 0.5 * j * dt * dt
        } else if t < t4 {
            block.cruise_velocity
        } else if t < t5 {
            let dt = t - t4;
            block.cruise_velocity - 0.5 * j * dt * dt
        } else if t < t6 {
            let dt = t - t5;
            block.cruise_velocity - 0.5 * j * block.t_j3 * block.t_j3 - block.accel_max * dt
        } else {
            let dt = t6 - t.min(t6);
            block.exit_velocity + 0.5 * j * dt * dt
        }
    }

    /// Generates the next `MIN_SEGMENT_TIME`-bounded slice of the running
    /// block (or starts running the block at `tail` if none is running
    /// yet). Finalizes and dequeues the block when its `move_time` is
    /// exhausted. Returns `None` if the queue is empty.
    pub fn exec(&mut self) -> Option<ExecSegment> {
        if self.count == 0 {
            return None;
        }
        let idx = self.tail;
        if self.blocks[idx].state == BlockState::Queued {
            self.blocks[idx].state = BlockState::Running;
            if self.blocks[idx].move_type != MoveType::Command {
                Self::forward_plan(&mut self.blocks[idx]);
            }
            self.blocks[idx].phase_cursor = 0.0;
        }

        let block = self.blocks[idx];

        if block.move_type == MoveType::Command {
            self.finalize_running_block();
            return Some(ExecSegment {
                move_type: block.move_type,
                gm: block.gm,
                unit_vector: block.unit_vector,
                start_v: 0.0,
                end_v: 0.0,
                distance: 0.0,
                duration_min: block.move_time,
                is_end_of_block: true,
                command: block.command,
                command_args: block.command_args,
            });
        }

        let remaining = block.move_time - block.phase_cursor;
        if remaining <= 0.0 {
            self.finalize_running_block();
            return self.exec();
        }

        let slice = fminf(remaining, MIN_SEGMENT_TIME).max(f32::MIN_POSITIVE);
        let is_last = remaining <= MIN_SEGMENT_TIME;
        let t0 = block.phase_cursor;
        let t1 = if is_last { block.move_time } else { t0 + slice };

        let v0 = Self::velocity_at(&block, t0);
        let v1 = Self::velocity_at(&block, t1);
        // Trapezoidal-rule distance estimate over the slice.
        let distance = 0.5 * (v0 + v1) * (t1 - t0);

        self.blocks[idx].phase_cursor = t1;
        if is_last {
            self.finalize_running_block();
        }

        Some(ExecSegment {
            move_type: block.move_type,
            gm: block.gm,
            unit_vector: block.unit_vector,
            start_v: v0,
            end_v: v1,
            distance,
            duration_min: t1 - t0,
            is_end_of_block: is_last,
            command: CommandKind::None,
            command_args: [0.0; 2],
        })
    }

    fn finalize_running_block(&mut self) {
        if self.count == 0 {
            return;
        }
        self.blocks[self.tail].state = BlockState::Finalized;
        self.blocks[self.tail] = PlannerBlock::default();
        self.tail = self.next_index(self.tail);
        self.count -= 1;
        self.runnable_count -= 1;
    }

    /// Alarm-induced flush: unconditionally drops all non-running blocks.
    pub fn flush_alarm(&mut self) {
        self.drop_non_running();
    }

    /// User-initiated flush: only drops non-running blocks if the safety
    /// manager currently permits a queue flush.
    pub fn flush_requested(&mut self, can_queue_flush: bool) {
        if can_queue_flush {
            self.drop_non_running();
        }
    }

    fn drop_non_running(&mut self) {
        if self.count == 0 {
            return;
        }
        if self.blocks[self.tail].state == BlockState::Running {
            let running = self.blocks[self.tail];
            self.blocks = [PlannerBlock::default(); PLANNER_BUFFER_SIZE];
            self.blocks[0] = running;
            self.tail = 0;
            self.head = 1;
            self.count = 1;
            self.runnable_count = 1;
        } else {
            self.blocks = [PlannerBlock::default(); PLANNER_BUFFER_SIZE];
            self.tail = 0;
            self.head = 0;
            self.count = 0;
            self.runnable_count = 0;
        }
    }

    pub fn block_count(&self) -> usize {
        self.count
    }

    pub fn steps_per_unit_max(&self, axis: usize) -> f32 {
        self.steps_per_unit_max[axis]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{FeedRateMode, GCodeState};

    fn planner() -> MotionPlanner {
        let mut jerk = [0.0; MAX_AXES];
        let mut feed = [0.0; MAX_AXES];
        let mut steps = [0.0; MAX_AXES];
        for i in 0..3 {
            jerk[i] = 100.0;
            feed[i] = 6000.0;
            steps[i] = 100.0;
        }
        MotionPlanner::new(jerk, feed, steps)
    }

    fn gm_feed(feed_rate: f32) -> GCodeState {
        let mut gm = GCodeState::default();
        gm.feed_rate_mode = FeedRateMode::UnitsPerMinute;
        gm.feed_rate = feed_rate;
        gm
    }

    #[test]
    fn zero_length_move_is_rejected() {
        let mut p = planner();
        let zero = [0.0; MAX_AXES];
        let err = p.aline(&zero, &zero, &gm_feed(1000.0), MoveType::Aligned, 0.1).unwrap_err();
        assert_eq!(err, PlannerError::MinimumLengthMove);
    }

    #[test]
    fn single_move_queues_and_drains() {
        let mut p = planner();
        let zero = [0.0; MAX_AXES];
        let mut target = [0.0; MAX_AXES];
        target[0] = 10.0;
        p.aline(&target, &zero, &gm_feed(600.0), MoveType::Aligned, 0.1).unwrap();
        assert_eq!(p.block_count(), 1);

        let mut total_distance = 0.0;
        let mut iterations = 0;
        while let Some(seg) = p.exec() {
            total_distance += seg.distance;
            iterations += 1;
            assert!(iterations < 100_000);
        }
        assert!((total_distance - 10.0).abs() < 0.05);
        assert!(p.is_empty());
        assert!(!p.has_runnable_buffer());
    }

    #[test]
    fn flush_alarm_drops_queued_blocks() {
        let mut p = planner();
        let zero = [0.0; MAX_AXES];
        let mut target = [0.0; MAX_AXES];
        target[0] = 10.0;
        p.aline(&target, &zero, &gm_feed(600.0), MoveType::Aligned, 0.1).unwrap();
        p.aline(&[0.0; MAX_AXES], &target, &gm_feed(600.0), MoveType::Aligned, 0.1)
            .unwrap_or(());
        p.flush_alarm();
        assert!(!p.has_runnable_buffer());
    }

    #[test]
    fn queue_full_is_reported() {
        let mut p = planner();
        let mut position = [0.0; MAX_AXES];
        for _ in 0..PLANNER_BUFFER_SIZE {
            let mut target = position;
            target[0] += 1.0;
            p.aline(&target, &position, &gm_feed(600.0), MoveType::Aligned, 0.1).unwrap();
            position = target;
        }
        let mut target = position;
        target[0] += 1.0;
        let err = p.aline(&target, &position, &gm_feed(600.0), MoveType::Aligned, 0.1).unwrap_err();
        assert_eq!(err, PlannerError::QueueFull);
    }
}
