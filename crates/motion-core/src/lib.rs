//! # motion-core
//!
//! A deterministic motion-planning and step-pulse-generation core usable on
//! both host and MCU (`no_std`-friendly). Owns the G-code-semantic layer
//! (the canonical machine), the jerk-limited planner, kinematics, the input
//! dispatcher, the safety manager, and the toolhead contract; leaves the DDA
//! pulse engine itself to `dda-stepper` and hardware pin access to the
//! `driver-*` crates.
//!
//! Provides core motion primitives:
//! - Kinematics (Cartesian, CoreXY, four-cable, pressure-regulated)
//! - Jerk-limited S-curve velocity planning over a ring-buffered block queue
//! - The canonical machine's feedhold state machine and coordinate system math
//! - Input edge dispatch and the safety/interlock gate
//! - The toolhead contract for spindle and laser actuators

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod bridge;
pub mod canonical;
pub mod errors;
pub mod input;
pub mod kinematics;
pub mod planner;
pub mod profile;
pub mod safety;
pub mod toolhead;

pub use bridge::prep_segment;
pub use canonical::{CanonicalMachine, DualCanonicalMachine, GCodeState};
pub use errors::{AssertionError, CycleError, PersistenceError, PlannerError};
pub use input::{ActionTag, Handler, InputDispatcher};
pub use kinematics::{CartesianKinematics, CoreXyKinematics, FourCableKinematics, Kinematics, PressureKinematics};
pub use planner::{ExecSegment, MotionPlanner, PlannerBlock};
pub use safety::SafetyManager;
pub use toolhead::{EscSpindle, LaserTool, Toolhead};

/// Maximum number of logical axes the canonical machine and planner carry
/// (X Y Z A B C U V W): wider than any single configuration needs so the
/// same binary serves Cartesian, gantry, and cable-driven machines without a
/// const-generic per build.
pub const MAX_AXES: usize = 9;

/// Static per-axis configuration: jerk and feedrate ceilings the planner
/// clamps every move against. Travel limits and homed state live on
/// [`canonical::AxisLimits`] since they change at runtime (homing); this
/// struct holds what's fixed at configuration-load time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Axis {
    pub number: u8,
    pub jerk_max: f32,
    pub feedrate_max: f32,
}

/// Static per-motor configuration: which axis a motor is mapped to (or `-1`
/// for a CoreXY/cable motor with no single-axis mapping) and its steps per
/// unit of travel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Motor {
    pub number: u8,
    pub steps_per_unit: f32,
    pub axis_map: i8,
    pub polarity: bool,
}
