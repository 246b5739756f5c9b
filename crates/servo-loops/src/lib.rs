#![cfg_attr(not(feature = "std"), no_std)]

//! # Servo Loops
//!
//! Shared closed-loop control primitives reused across the motion core's
//! non-cartesian kinematics idle loops and the toolhead's speed ramping:
//!
//! - **Signal filtering**: low-pass and moving-average filters for noisy
//!   sensor readings (tension sensors, pressure transducers) before they
//!   feed a control loop.
//! - **PID controller**: anti-windup PID used by pressure-regulated
//!   kinematics' idle-loop corrective motion.
//! - **`no_std` support**: usable from the firmware side as well as host
//!   simulation/testing.

pub mod filter;
pub mod pid;

pub use filter::{Filter, LowPassFilter, MovingAverageFilter};
pub use pid::Pid;
