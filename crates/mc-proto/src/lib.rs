#![deny(clippy::all)]
#![deny(warnings)]
#![cfg_attr(not(feature = "std"), no_std)]

//! # mc-proto
//!
//! A `no_std`-capable, zero-copy implementation of the wire protocol between
//! the host controller and the MCU: queued motion segments, feedhold/
//! cycle-start requests, status reports, and configuration-token get/set.
//!
//! ## Key Components
//!
//! - **[`parser`]**: A zero-copy `Parser` that decodes frames from a byte
//!   stream, plus a matching `encode` for the host or firmware side to
//!   build them, designed for use from an interrupt handler or async task.
//! - **[`commands`]**: Typed enums for all `Command`s and `Response`s
//!   carried inside a frame.
//! - **[`crc`]**: A `const fn` implementation of the CRC16-CCITT algorithm
//!   used for frame integrity.
//!
//! ## Design
//!
//! - **Zero-copy**: operates on `&[u8]` slices and avoids heap allocation.
//! - **Streaming**: handles partial frames, finding frame boundaries in a
//!   continuous stream of bytes.
//! - **Fuzzing-resistant**: length and CRC checks reject malformed input
//!   without panicking.

pub mod commands;
pub mod crc;
pub mod parser;

/// Common error type for the protocol crate.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// A frame was received that was not long enough to be valid.
    IncompleteFrame,
    /// An invalid frame sync byte (0x1D) was expected but not found.
    InvalidSync,
    /// The CRC-16 checksum of a received frame was invalid.
    InvalidCrc,
    /// The message payload could not be decoded into a known command.
    InvalidPayload,
    /// A buffer was too small for the requested operation.
    BufferTooSmall,
}
