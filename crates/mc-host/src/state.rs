//! Machine State
//!
//! Holds all dynamic, host-visible information about the machine: the
//! canonical machine's G-code-semantic snapshot, the connection status to
//! the MCU, and the last status-report token values received. Safe to share
//! across concurrent tasks behind a `parking_lot::Mutex`.

use motion_core::canonical::CanonicalMachine;
use serde::Serialize;
use std::collections::BTreeMap;

/// High-level connection/run status surfaced to API clients. Distinct from
/// `motion_core::canonical::MachineState`, which is the canonical machine's
/// own G-code-visible run state (alarm/cycle/shutdown/etc) and is read
/// through `CanonicalMachine::machine_state` instead.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ConnectionStatus {
    Initializing,
    Ready,
    Running,
    Disconnected,
}

/// One token's last-known value from a status report, keyed by its 2-4
/// character wire token (e.g. `posx`, `stat`, `line`).
#[derive(Debug, Clone, Serialize)]
pub enum TokenValue {
    Int(i32),
    Float(f32),
    Bool(bool),
}

/// All dynamic state the host tracks: the canonical machine itself, the
/// link status to the MCU, and the most recent status-report tokens keyed
/// by name for cheap JSON serialization to API clients.
pub struct MachineState {
    pub connection: ConnectionStatus,
    pub status_message: String,
    pub canonical: CanonicalMachine,
    pub last_report: BTreeMap<String, TokenValue>,
}

impl MachineState {
    pub fn new() -> Self {
        Self {
            connection: ConnectionStatus::Initializing,
            status_message: "host is starting".to_string(),
            canonical: CanonicalMachine::new(),
            last_report: BTreeMap::new(),
        }
    }

    /// A JSON-friendly snapshot for the status API and WebSocket stream:
    /// display position per axis, connection state, and the raw token map.
    pub fn snapshot(&self) -> MachineSnapshot {
        let mut position = [0.0f32; motion_core::MAX_AXES];
        for (axis, slot) in position.iter_mut().enumerate() {
            *slot = self.canonical.display_position(axis);
        }
        let motion_mode = match self.canonical.gm.motion_mode {
            motion_core::canonical::MotionMode::G0 => "G0",
            motion_core::canonical::MotionMode::G1 => "G1",
            motion_core::canonical::MotionMode::G2 => "G2",
            motion_core::canonical::MotionMode::G3 => "G3",
            motion_core::canonical::MotionMode::G80 => "G80",
        };
        MachineSnapshot {
            connection: self.connection,
            status_message: self.status_message.clone(),
            motion_mode,
            position,
            tokens: self.last_report.clone(),
        }
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MachineSnapshot {
    pub connection: ConnectionStatus,
    pub status_message: String,
    pub motion_mode: &'static str,
    pub position: [f32; motion_core::MAX_AXES],
    pub tokens: BTreeMap<String, TokenValue>,
}
