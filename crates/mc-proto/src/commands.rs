#![deny(clippy::all)]
#![deny(warnings)]

//! Typed command and response payloads carried inside a [`crate::parser`] frame.
//!
//! Commands flow host -> MCU: queued motion, feedhold/cycle-start, config
//! token get/set, digital/pwm output writes. Responses flow MCU -> host:
//! identify, status report blobs, config-token echoes, and structured
//! error reports.

/// Motor channel count shared with the motion-core/dda-stepper pair. Not a
/// dependency on either crate: the wire format just needs to agree with them.
pub const MAX_MOTORS: usize = 6;

/// A top-level framed message: either a command from the host or a
/// response from the MCU.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Message<'a> {
    Command(Command<'a>),
    Response(Response<'a>),
}

/// A short configuration token, e.g. `xvm`, `1mi`, `g54x`. Stored as a
/// fixed 4-byte ASCII buffer, zero-padded; unused trailing bytes are `0`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ConfigToken(pub [u8; 4]);

impl ConfigToken {
    pub fn from_str(s: &str) -> Self {
        let mut buf = [0u8; 4];
        for (i, b) in s.as_bytes().iter().take(4).enumerate() {
            buf[i] = *b;
        }
        Self(buf)
    }

    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(4);
        core::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

/// A tunable's value, matching the persisted-state layout: one 4-byte slot
/// holding either an `i32` or an `f32`, plus a `bool` for flag-type tokens.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ConfigValue {
    Int(i32),
    Float(f32),
    Bool(bool),
}

impl ConfigValue {
    /// Packs the value into its type tag plus 4-byte wire representation.
    pub fn to_wire(self) -> (u8, [u8; 4]) {
        match self {
            ConfigValue::Int(v) => (0, v.to_be_bytes()),
            ConfigValue::Float(v) => (1, v.to_be_bytes()),
            ConfigValue::Bool(v) => (2, [v as u8, 0, 0, 0]),
        }
    }

    pub fn from_wire(tag: u8, bytes: [u8; 4]) -> Option<Self> {
        match tag {
            0 => Some(ConfigValue::Int(i32::from_be_bytes(bytes))),
            1 => Some(ConfigValue::Float(f32::from_be_bytes(bytes))),
            2 => Some(ConfigValue::Bool(bytes[0] != 0)),
            _ => None,
        }
    }
}

/// Status-report verbosity: silent, filtered (fields only when changed),
/// or verbose (every configured field every tick).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Verbosity {
    Silent,
    Filtered,
    Verbose,
}

impl Verbosity {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Verbosity::Silent => 0,
            Verbosity::Filtered => 1,
            Verbosity::Verbose => 2,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Self {
        match b {
            1 => Verbosity::Filtered,
            2 => Verbosity::Verbose,
            _ => Verbosity::Silent,
        }
    }
}

/// One motor's per-segment DDA load, mirroring `dda_stepper::DdaChannelLoad`
/// without depending on it: the host prepares segments and ships the
/// already-computed rate/direction/step triple to the MCU.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct ChannelLoad {
    pub rate: u32,
    pub direction_positive: bool,
    pub steps: u32,
}

/// A queued motion segment: one DDA-rate load per motor channel, plus the
/// high-tier tick count and block-boundary flag the runtime needs to flip
/// the prep/runtime double buffer at the right moment.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct QueueMove {
    pub channels: [ChannelLoad; MAX_MOTORS],
    pub hi_tier_ticks: u32,
    pub is_end_of_block: bool,
}

/// Commands sent from the host to the MCU.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Command<'a> {
    /// Handshake: host announces the protocol revision it speaks.
    Identify { protocol_version: u8 },
    GetConfig,
    GetStatus,
    SetStatusVerbosity(Verbosity),
    QueueMove(QueueMove),
    /// Orderly decelerate-to-zero-and-hold; queue is retained for resume.
    Feedhold,
    /// Resume from a feedhold.
    CycleStart,
    /// Discard queued (not currently running) segments.
    QueueFlush,
    ConfigGet { token: ConfigToken },
    ConfigSet { token: ConfigToken, value: ConfigValue },
    DigitalOutputSet { external_number: u8, value: bool },
    PwmOutputSet { external_number: u8, duty: u16 },
    /// Soft reset back to the alarm-clearable idle state.
    Reset,
    Unknown(u8, &'a [u8]),
}

/// The structured error code a `Response::Error` carries.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StatusCode {
    Ok,
    ValueOutOfRange,
    FeedrateNotSpecified,
    WordMissing,
    MinimumLengthMove,
    SoftLimitExceeded,
    RejectedByAlarm,
    RejectedByShutdown,
    RejectedByPanic,
    HomingFailure,
    ProbeFailure,
    AssertionFailure,
    PersistenceError,
}

impl StatusCode {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::ValueOutOfRange => 1,
            StatusCode::FeedrateNotSpecified => 2,
            StatusCode::WordMissing => 3,
            StatusCode::MinimumLengthMove => 4,
            StatusCode::SoftLimitExceeded => 5,
            StatusCode::RejectedByAlarm => 6,
            StatusCode::RejectedByShutdown => 7,
            StatusCode::RejectedByPanic => 8,
            StatusCode::HomingFailure => 9,
            StatusCode::ProbeFailure => 10,
            StatusCode::AssertionFailure => 11,
            StatusCode::PersistenceError => 12,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Self {
        match b {
            1 => StatusCode::ValueOutOfRange,
            2 => StatusCode::FeedrateNotSpecified,
            3 => StatusCode::WordMissing,
            4 => StatusCode::MinimumLengthMove,
            5 => StatusCode::SoftLimitExceeded,
            6 => StatusCode::RejectedByAlarm,
            7 => StatusCode::RejectedByShutdown,
            8 => StatusCode::RejectedByPanic,
            9 => StatusCode::HomingFailure,
            10 => StatusCode::ProbeFailure,
            11 => StatusCode::AssertionFailure,
            12 => StatusCode::PersistenceError,
            _ => StatusCode::Ok,
        }
    }
}

/// Responses sent from the MCU back to the host.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Response<'a> {
    Identify { protocol_version: u8, firmware_build: &'a [u8] },
    /// Raw status-report payload: an ordered blob of token values the host
    /// decodes against the config registry it already owns. Keeping this
    /// zero-copy avoids the MCU needing to know token names.
    Status { tick: u32, payload: &'a [u8] },
    ConfigValue { token: ConfigToken, value: ConfigValue },
    Ack,
    Error { code: StatusCode, external_number: u8 },
    Unknown(u8, &'a [u8]),
}

pub(crate) mod ids {
    pub const IDENTIFY: u8 = 0x01;
    pub const GET_CONFIG: u8 = 0x02;
    pub const GET_STATUS: u8 = 0x03;
    pub const SET_STATUS_VERBOSITY: u8 = 0x04;
    pub const QUEUE_MOVE: u8 = 0x10;
    pub const FEEDHOLD: u8 = 0x11;
    pub const CYCLE_START: u8 = 0x12;
    pub const QUEUE_FLUSH: u8 = 0x13;
    pub const CONFIG_GET: u8 = 0x20;
    pub const CONFIG_SET: u8 = 0x21;
    pub const DIGITAL_OUTPUT_SET: u8 = 0x30;
    pub const PWM_OUTPUT_SET: u8 = 0x31;
    pub const RESET: u8 = 0x3f;

    pub const RESP_IDENTIFY: u8 = 0x81;
    pub const RESP_STATUS: u8 = 0x82;
    pub const RESP_CONFIG_VALUE: u8 = 0x83;
    pub const RESP_ACK: u8 = 0x84;
    pub const RESP_ERROR: u8 = 0x85;
}
