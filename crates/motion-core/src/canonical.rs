//! The canonical machine: the G-code-semantic layer sitting above the planner.
//!
//! Mirrors the shape of the teacher's `MotionPlanner` owning its own state
//! directly, but splits the G-code-visible snapshot (`GCodeState`) from the
//! machine-wide context (`CanonicalMachine`) the way the spec's data model
//! separates them — `gm` is copied into each `PlannerBlock` at enqueue time
//! and is otherwise immutable once queued.

#[cfg(not(feature = "std"))]
use libm::sqrtf;
#[cfg(feature = "std")]
fn sqrtf(v: f32) -> f32 {
    v.sqrt()
}

use crate::MAX_AXES;

/// Number of stored coordinate systems (G54..G59) plus the implicit slot 0
/// (machine/absolute), matching `coord_offset[COORDS+1][AXES]`.
pub const COORDS: usize = 6;
pub const PROBES_STORED: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionMode {
    #[default]
    G0,
    G1,
    G2,
    G3,
    G80,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitsMode {
    #[default]
    Millimeters,
    Inches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Plane {
    #[default]
    Xy,
    Xz,
    Yz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathControl {
    #[default]
    ExactPath,
    ExactStop,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMode {
    #[default]
    Absolute,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedRateMode {
    InverseTime,
    #[default]
    UnitsPerMinute,
    UnitsPerRev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpindleDirection {
    #[default]
    Off,
    Cw,
    Ccw,
}

/// Per-block semantic snapshot, copied into each `PlannerBlock` at enqueue
/// time; the copy is immutable thereafter except for override scaling.
#[derive(Debug, Clone, Copy)]
pub struct GCodeState {
    pub linenum: u32,
    pub motion_mode: MotionMode,
    pub coord_system: u8, // 0 = none/G53, 1..=COORDS maps to G54..G59
    pub units_mode: UnitsMode,
    pub select_plane: Plane,
    pub path_control: PathControl,
    pub distance_mode: DistanceMode,
    pub arc_distance_mode: DistanceMode,
    pub feed_rate_mode: FeedRateMode,
    pub feed_rate: f32,
    pub tool: u8,
    pub tool_select: u8,
    pub spindle_direction: SpindleDirection,
    pub spindle_speed: f32,
    pub p_word: f32,
    pub h_word: f32,
    pub absolute_override: bool,
    pub target: [f32; MAX_AXES],
    pub display_offset: [f32; MAX_AXES],
}

impl Default for GCodeState {
    fn default() -> Self {
        Self {
            linenum: 0,
            motion_mode: MotionMode::default(),
            coord_system: 1,
            units_mode: UnitsMode::default(),
            select_plane: Plane::default(),
            path_control: PathControl::default(),
            distance_mode: DistanceMode::default(),
            arc_distance_mode: DistanceMode::default(),
            feed_rate_mode: FeedRateMode::default(),
            feed_rate: 0.0,
            tool: 0,
            tool_select: 0,
            spindle_direction: SpindleDirection::default(),
            spindle_speed: 0.0,
            p_word: 0.0,
            h_word: 0.0,
            absolute_override: false,
            target: [0.0; MAX_AXES],
            display_offset: [0.0; MAX_AXES],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineState {
    #[default]
    Initializing,
    Ready,
    Alarm,
    ProgramStop,
    ProgramEnd,
    Cycle,
    Interlock,
    Shutdown,
    Panic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleType {
    #[default]
    None,
    Machining,
    Homing,
    Probe,
    Jog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    #[default]
    Stop,
    Planning,
    Run,
    Hold,
}

/// The 13-stage feedhold state machine. Advanced one step at a time by
/// `CanonicalMachine::callback_feedhold`; re-entrant until each stage's
/// precondition is met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoldState {
    #[default]
    Off,
    Requested,
    Sync,
    DecelContinue,
    DecelToZero,
    DecelComplete,
    MotionStopping,
    MotionStopped,
    HoldActionsPending,
    HoldActionsComplete,
    Holding,
    ExitActionsPending,
    ExitActionsComplete,
}

/// Exit action requested once a hold completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoldExitAction {
    #[default]
    Resume,
    Stop,
    Interlock,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeResult {
    pub valid: bool,
    pub position: [f32; MAX_AXES],
}

/// Snapshot of the state restored on program end (M2/M30).
#[derive(Debug, Clone, Copy)]
pub struct DefaultsSnapshot {
    pub coord_system: u8,
    pub select_plane: Plane,
    pub distance_mode: DistanceMode,
    pub feed_rate_mode: FeedRateMode,
}

impl Default for DefaultsSnapshot {
    fn default() -> Self {
        Self {
            coord_system: 1,
            select_plane: Plane::default(),
            distance_mode: DistanceMode::default(),
            feed_rate_mode: FeedRateMode::default(),
        }
    }
}

/// Queries the canonical machine needs but does not own: whether an axis is
/// homed and its travel limits, kept here instead of duplicated per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisLimits {
    pub homed: bool,
    pub travel_min: f32,
    pub travel_max: f32,
}

pub struct CanonicalMachine {
    pub gm: GCodeState,
    pub position: [f32; MAX_AXES],
    pub g28_position: [f32; MAX_AXES],
    pub g30_position: [f32; MAX_AXES],
    pub g92_offset: [f32; MAX_AXES],
    pub g92_offset_enable: bool,
    pub last_line_number: u32,
    pub m48_enable: bool,
    pub mfo_factor: f32,
    pub mfo_enable: bool,
    pub mto_factor: f32,
    pub mto_enable: bool,
    pub mfo_min: f32,
    pub mfo_max: f32,
    pub mto_min: f32,
    pub mto_max: f32,

    /// Index 0 is the machine/G53 frame (always zero); indices 1..=COORDS are G54..G59.
    pub coord_offset: [[f32; MAX_AXES]; COORDS + 1],
    pub tool_offset: [f32; MAX_AXES],
    pub rotation_matrix: [[f32; 3]; 3],
    pub rotation_z_offset: f32,

    pub probe_state: [bool; PROBES_STORED],
    pub probe_results: [ProbeResult; PROBES_STORED],

    pub homing_state: bool,
    pub cycle_type: CycleType,
    pub motion_state: MotionState,
    pub hold_state: HoldState,
    pub hold_exit_action: HoldExitAction,
    pub machine_state: MachineState,

    pub soft_limit_enable: bool,
    pub limit_enable: bool,
    pub axis_limits: [AxisLimits; MAX_AXES],

    pub defaults: DefaultsSnapshot,

    pub junction_integration_time: f32,
    pub chordal_tolerance: f32,
}

impl Default for CanonicalMachine {
    fn default() -> Self {
        Self {
            gm: GCodeState::default(),
            position: [0.0; MAX_AXES],
            g28_position: [0.0; MAX_AXES],
            g30_position: [0.0; MAX_AXES],
            g92_offset: [0.0; MAX_AXES],
            g92_offset_enable: false,
            last_line_number: 0,
            m48_enable: true,
            mfo_factor: 1.0,
            mfo_enable: false,
            mto_factor: 1.0,
            mto_enable: false,
            mfo_min: 0.05,
            mfo_max: 2.0,
            mto_min: 0.05,
            mto_max: 2.0,
            coord_offset: [[0.0; MAX_AXES]; COORDS + 1],
            tool_offset: [0.0; MAX_AXES],
            rotation_matrix: identity3(),
            rotation_z_offset: 0.0,
            probe_state: [false; PROBES_STORED],
            probe_results: [ProbeResult::default(); PROBES_STORED],
            homing_state: false,
            cycle_type: CycleType::default(),
            motion_state: MotionState::default(),
            hold_state: HoldState::default(),
            hold_exit_action: HoldExitAction::default(),
            machine_state: MachineState::default(),
            soft_limit_enable: true,
            limit_enable: true,
            axis_limits: [AxisLimits::default(); MAX_AXES],
            defaults: DefaultsSnapshot::default(),
            junction_integration_time: 0.1,
            chordal_tolerance: 0.01,
        }
    }
}

fn identity3() -> [[f32; 3]; 3] {
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
}

impl CanonicalMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// `coord_offset[coord][axis] + tool_offset[axis] + (g92_offset_enable ? g92_offset[axis] : 0)`.
    pub fn combined_offset(&self, axis: usize) -> f32 {
        let coord = self.gm.coord_system as usize;
        let mut offset = self.coord_offset[coord][axis] + self.tool_offset[axis];
        if self.g92_offset_enable {
            offset += self.g92_offset[axis];
        }
        offset
    }

    /// `display_position = machine_position - combined_offset`, unless an
    /// absolute override (G53) is active, in which case no offset applies.
    pub fn display_position(&self, axis: usize) -> f32 {
        if self.gm.absolute_override {
            self.position[axis]
        } else {
            self.position[axis] - self.combined_offset(axis)
        }
    }

    /// Translates a display-frame target into machine-frame coordinates by
    /// adding the combined offset back in, then applying the tram rotation.
    pub fn translate_target(&self, display_target: [f32; MAX_AXES]) -> [f32; MAX_AXES] {
        let mut machine = [0.0; MAX_AXES];
        for axis in 0..MAX_AXES {
            machine[axis] = if self.gm.absolute_override {
                display_target[axis]
            } else {
                display_target[axis] + self.combined_offset(axis)
            };
        }
        self.apply_tram(machine)
    }

    fn apply_tram(&self, mut target: [f32; MAX_AXES]) -> [f32; MAX_AXES] {
        let (x, y, z) = (target[0], target[1], target[2]);
        let m = &self.rotation_matrix;
        target[0] = m[0][0] * x + m[0][1] * y + m[0][2] * z;
        target[1] = m[1][0] * x + m[1][1] * y + m[1][2] * z;
        target[2] = m[2][0] * x + m[2][1] * y + m[2][2] * z + self.rotation_z_offset;
        target
    }

    /// A block whose translated target exceeds `travel_min`/`travel_max` of
    /// any homed axis is rejected. Returns the first offending axis and
    /// which end it breached.
    pub fn check_soft_limits(&self, machine_target: &[f32; MAX_AXES]) -> Result<(), (usize, bool)> {
        if !self.soft_limit_enable {
            return Ok(());
        }
        for axis in 0..MAX_AXES {
            let limits = self.axis_limits[axis];
            if !limits.homed || limits.travel_min == limits.travel_max {
                continue;
            }
            if machine_target[axis] > limits.travel_max {
                return Err((axis, true));
            }
            if machine_target[axis] < limits.travel_min {
                return Err((axis, false));
            }
        }
        Ok(())
    }

    /// Computes `max_junction_accel = (sqrt(3)/10) * T^2 * jerk_max * 1e6` for
    /// an axis, where `T = junction_integration_time`. Recomputed whenever
    /// the configuration surface changes jerk for that axis.
    pub fn max_junction_accel(&self, jerk_max: f32) -> f32 {
        const SQRT3_OVER_10: f32 = 0.17320508;
        SQRT3_OVER_10 * self.junction_integration_time * self.junction_integration_time * jerk_max * 1.0e6
    }

    /// Sets the tram rotation from three probe results; clearing (`enable =
    /// false`) resets to identity and zero z-offset.
    pub fn set_tram(&mut self, enable: bool) -> Result<(), crate::errors::CycleError> {
        if !enable {
            self.rotation_matrix = identity3();
            self.rotation_z_offset = 0.0;
            return Ok(());
        }
        if self.probe_state.iter().filter(|&&v| v).count() < PROBES_STORED {
            return Err(crate::errors::CycleError::ProbeFailure);
        }
        let p0 = self.probe_results[0].position;
        let p1 = self.probe_results[1].position;
        let p2 = self.probe_results[2].position;

        let v1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
        let v2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];
        let mut normal = [
            v1[1] * v2[2] - v1[2] * v2[1],
            v1[2] * v2[0] - v1[0] * v2[2],
            v1[0] * v2[1] - v1[1] * v2[0],
        ];
        let mag = sqrtf(normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]);
        if mag < 1e-9 {
            return Err(crate::errors::CycleError::ProbeFailure);
        }
        for v in normal.iter_mut() {
            *v /= mag;
        }
        // Build the rotation that maps `normal` onto +Z using the standard
        // axis-angle (Rodrigues) formula rather than going through a
        // quaternion intermediate.
        let z = [0.0f32, 0.0, 1.0];
        let dot = normal[0] * z[0] + normal[1] * z[1] + normal[2] * z[2];
        if dot > 0.999999 {
            self.rotation_matrix = identity3();
        } else if dot < -0.999999 {
            self.rotation_matrix = [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]];
        } else {
            let axis = [
                normal[1] * z[2] - normal[2] * z[1],
                normal[2] * z[0] - normal[0] * z[2],
                normal[0] * z[1] - normal[1] * z[0],
            ];
            let s = sqrtf(axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]);
            let c = dot;
            let (kx, ky, kz) = (axis[0] / s, axis[1] / s, axis[2] / s);
            let one_minus_c = 1.0 - c;
            self.rotation_matrix = [
                [
                    c + kx * kx * one_minus_c,
                    kx * ky * one_minus_c - kz * s,
                    kx * kz * one_minus_c + ky * s,
                ],
                [
                    ky * kx * one_minus_c + kz * s,
                    c + ky * ky * one_minus_c,
                    ky * kz * one_minus_c - kx * s,
                ],
                [
                    kz * kx * one_minus_c - ky * s,
                    kz * ky * one_minus_c + kx * s,
                    c + kz * kz * one_minus_c,
                ],
            ];
        }
        self.rotation_z_offset = p0[2];
        Ok(())
    }

    /// Requests a feedhold; idempotent: calling it again before resume
    /// leaves the state machine in exactly one hold.
    pub fn request_feedhold(&mut self) {
        if self.hold_state == HoldState::Off {
            self.hold_state = HoldState::Requested;
        }
    }

    pub fn request_resume(&mut self) {
        if self.hold_state == HoldState::Holding {
            self.hold_exit_action = HoldExitAction::Resume;
            self.hold_state = HoldState::ExitActionsPending;
        }
    }

    /// Advances the feedhold state machine by one stage if its precondition
    /// is met. `runtime_idle` and `planner_empty` are polled from the
    /// caller's owned planner/runtime; `safety_ok` from the safety manager.
    pub fn callback_feedhold(&mut self, runtime_idle: bool, planner_empty: bool, safety_ok: bool) {
        self.hold_state = match self.hold_state {
            HoldState::Off => HoldState::Off,
            HoldState::Requested => HoldState::Sync,
            HoldState::Sync => HoldState::DecelContinue,
            HoldState::DecelContinue => HoldState::DecelToZero,
            HoldState::DecelToZero => {
                if runtime_idle {
                    HoldState::DecelComplete
                } else {
                    HoldState::DecelToZero
                }
            }
            HoldState::DecelComplete => HoldState::MotionStopping,
            HoldState::MotionStopping => {
                if runtime_idle {
                    HoldState::MotionStopped
                } else {
                    HoldState::MotionStopping
                }
            }
            HoldState::MotionStopped => HoldState::HoldActionsPending,
            HoldState::HoldActionsPending => HoldState::HoldActionsComplete,
            HoldState::HoldActionsComplete => HoldState::Holding,
            HoldState::Holding => HoldState::Holding,
            HoldState::ExitActionsPending => {
                if safety_ok || self.hold_exit_action != HoldExitAction::Resume {
                    HoldState::ExitActionsComplete
                } else {
                    HoldState::ExitActionsPending
                }
            }
            HoldState::ExitActionsComplete => {
                let _ = planner_empty;
                HoldState::Off
            }
        };
        if self.hold_state == HoldState::Off {
            self.motion_state = MotionState::Stop;
        } else if self.hold_state == HoldState::Holding {
            self.motion_state = MotionState::Hold;
        }
    }

    /// Moves the machine to alarm: motion stops, position preserved.
    pub fn alarm(&mut self) {
        self.machine_state = MachineState::Alarm;
        self.motion_state = MotionState::Stop;
    }

    /// Moves the machine to panic: blocks all further commands until reset.
    pub fn panic(&mut self) {
        self.machine_state = MachineState::Panic;
        self.motion_state = MotionState::Stop;
    }

    /// Moves the machine to shutdown: motion stops, no position guarantee.
    pub fn shutdown(&mut self) {
        self.machine_state = MachineState::Shutdown;
        self.motion_state = MotionState::Stop;
    }

    pub fn clear_alarm(&mut self) -> bool {
        if self.machine_state == MachineState::Alarm {
            self.machine_state = MachineState::Ready;
            true
        } else {
            false
        }
    }

    /// Program end (M2/M30): restores defaults, suspends G92, cancels
    /// motion mode, enables overrides, stops spindle/coolant. Intended to be
    /// invoked by a queued command's callback so it lands on a block
    /// boundary.
    pub fn program_end(&mut self) {
        self.gm.coord_system = self.defaults.coord_system;
        self.gm.select_plane = self.defaults.select_plane;
        self.gm.distance_mode = self.defaults.distance_mode;
        self.gm.feed_rate_mode = self.defaults.feed_rate_mode;
        self.g92_offset_enable = false;
        self.gm.motion_mode = MotionMode::G80;
        self.m48_enable = true;
        self.gm.spindle_direction = SpindleDirection::Off;
        self.gm.spindle_speed = 0.0;
        self.machine_state = MachineState::ProgramEnd;
    }
}

/// Selects which of `cm1`/`cm2` is currently active. `cm2` stands in for the
/// primary during a probe/jog performed mid-feedhold; it never shares
/// offset tables or planners with `cm1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineSelector {
    #[default]
    Primary,
    Secondary,
}

pub struct DualCanonicalMachine {
    pub cm1: CanonicalMachine,
    pub cm2: CanonicalMachine,
    pub active: MachineSelector,
}

impl Default for DualCanonicalMachine {
    fn default() -> Self {
        Self {
            cm1: CanonicalMachine::new(),
            cm2: CanonicalMachine::new(),
            active: MachineSelector::Primary,
        }
    }
}

impl DualCanonicalMachine {
    pub fn active(&self) -> &CanonicalMachine {
        match self.active {
            MachineSelector::Primary => &self.cm1,
            MachineSelector::Secondary => &self.cm2,
        }
    }

    pub fn active_mut(&mut self) -> &mut CanonicalMachine {
        match self.active {
            MachineSelector::Primary => &mut self.cm1,
            MachineSelector::Secondary => &mut self.cm2,
        }
    }

    /// Activates the secondary machine for a probe/jog performed during a
    /// feedhold on the primary; the primary's move stack is left untouched.
    pub fn activate_secondary(&mut self) {
        self.active = MachineSelector::Secondary;
    }

    pub fn restore_primary(&mut self) {
        self.active = MachineSelector::Primary;
    }
}
