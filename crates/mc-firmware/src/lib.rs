#![no_std]

//! Shared module tree for the motion-control MCU firmware: board pin
//! mapping, the DDA/safety/protocol tasks, and the fixed-point helper used
//! by the analog sampling path. `src/main.rs` is the thin binary entry
//! point that wires these into an Embassy or RTIC executor depending on
//! which `*-rt` feature is active, since the two runtimes want the
//! `#[entry]`/`#[embassy_executor::main]` attribute at the crate root.

pub mod adc;
pub mod fixed_point;
pub mod proto_bridge;
pub mod safety;
pub mod stepper;

#[cfg(feature = "embassy-rt")]
#[path = "../boards/mod.rs"]
pub mod boards;
