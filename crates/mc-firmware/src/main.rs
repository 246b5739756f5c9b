#![no_std]
#![no_main]
#![feature(type_alias_impl_trait)]

use defmt_rtt as _; // global logger
use panic_probe as _;

// `adc`/`fixed_point`/`proto_bridge`/`safety`/`stepper` live in `lib.rs` so
// both this binary and the integration tests under `test/` can reach them
// as `mc_firmware::...`.

#[cfg(feature = "embassy-rt")]
mod embassy_main;
#[cfg(feature = "embassy-rt")]
use embassy_main as _;

#[cfg(feature = "rtic-rt")]
mod rtic_main;
#[cfg(feature = "rtic-rt")]
use rtic_main as _;
