//! G-code Parser and Dispatcher
//!
//! Parses a line of G-code into words, then dispatches it against the
//! canonical machine: modal-state changes (units, distance mode, plane,
//! coordinate system, path control) mutate `CanonicalMachine::gm` directly;
//! motion words (G0/G1/G2/G3) are translated through the configured
//! kinematics into a `mc-proto` `QueueMove` and handed to the MCU client.

use crate::{config::PrinterConfig, state::MachineState};
use anyhow::Result;
use mc_proto::commands::{ChannelLoad, Command as McuCommand, QueueMove, MAX_MOTORS};
use motion_core::canonical::{DistanceMode, MotionMode, Plane, SpindleDirection, UnitsMode};
use motion_core::{CartesianKinematics, Kinematics, MAX_AXES};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

/// One parsed G-code line: the command word (`G1`, `M3`, ... including a
/// trailing `.N` sub-code) and its parameter words.
#[derive(Debug, PartialEq, Clone)]
pub struct GCode {
    pub command: String,
    pub params: Vec<(char, f32)>,
}

/// Parses a single line, stripping comments after `;`. Returns `None` for
/// blank/comment-only lines or a line with no recognizable command word.
pub fn parse_gcode(line: &str) -> Option<GCode> {
    let clean_line = line.split(';').next().unwrap_or("").trim();
    if clean_line.is_empty() {
        return None;
    }

    let mut parts = clean_line.split_whitespace();
    let command = parts.next()?.to_uppercase();
    let mut params = Vec::new();

    for part in parts {
        let mut chars = part.chars();
        let Some(key) = chars.next() else { continue };
        let value_str: String = chars.as_str().to_string();
        if let Ok(value) = value_str.parse::<f32>() {
            params.push((key.to_ascii_uppercase(), value));
        }
    }

    Some(GCode { command, params })
}

fn param(gcode: &GCode, key: char) -> Option<f32> {
    gcode.params.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// The central dispatcher for processing G-code commands against the
/// canonical machine and the configured kinematics.
pub struct GCodeDispatcher {
    #[allow(dead_code)]
    config: Arc<PrinterConfig>,
    state: Arc<Mutex<MachineState>>,
    mcu_tx: Sender<McuCommand<'static>>,
    kinematics: CartesianKinematics,
    segment_time: f32,
}

impl GCodeDispatcher {
    pub fn new(config: Arc<PrinterConfig>, state: Arc<Mutex<MachineState>>, mcu_tx: Sender<McuCommand<'static>>) -> Self {
        let steps_per_unit = |axis_token: &str| -> f32 {
            match config.tokens.get(axis_token) {
                Some(entry) => match entry.value {
                    mc_proto::commands::ConfigValue::Float(v) => v,
                    mc_proto::commands::ConfigValue::Int(v) => v as f32,
                    _ => 200.0,
                },
                None => 200.0,
            }
        };
        let kinematics = CartesianKinematics::new(
            [steps_per_unit("1sa"), steps_per_unit("2sa"), steps_per_unit("3sa"), 0.0, 0.0, 0.0],
            [0, 1, 2, -1, -1, -1],
        );
        Self { config, state, mcu_tx, kinematics, segment_time: 0.01 }
    }

    pub async fn run(&mut self, mut gcode_rx: tokio::sync::mpsc::Receiver<GCode>) {
        info!("G-code dispatcher is running.");
        while let Some(gcode) = gcode_rx.recv().await {
            if let Err(e) = self.dispatch(gcode).await {
                warn!("error dispatching G-code: {}", e);
            }
        }
    }

    async fn dispatch(&mut self, gcode: GCode) -> Result<()> {
        match gcode.command.as_str() {
            "G0" | "G1" => self.handle_linear_move(&gcode, gcode.command == "G1").await?,
            "G4" => { /* dwell: handled by the MCU's own queue, nothing to translate here */ }
            "G17" => self.state.lock().canonical.gm.select_plane = Plane::Xy,
            "G18" => self.state.lock().canonical.gm.select_plane = Plane::Xz,
            "G19" => self.state.lock().canonical.gm.select_plane = Plane::Yz,
            "G20" => self.state.lock().canonical.gm.units_mode = UnitsMode::Inches,
            "G21" => self.state.lock().canonical.gm.units_mode = UnitsMode::Millimeters,
            "G28" => self.handle_home().await?,
            "G54" | "G55" | "G56" | "G57" | "G58" | "G59" => {
                let coord = gcode.command.as_bytes()[2] - b'4' + 1;
                self.state.lock().canonical.gm.coord_system = coord;
            }
            "G80" => self.state.lock().canonical.gm.motion_mode = MotionMode::G80,
            "G90" => self.state.lock().canonical.gm.distance_mode = DistanceMode::Absolute,
            "G91" => self.state.lock().canonical.gm.distance_mode = DistanceMode::Incremental,
            "G92" => self.handle_set_offset(&gcode),
            "G92.1" | "G92.2" => {
                let mut state = self.state.lock();
                state.canonical.g92_offset = [0.0; MAX_AXES];
                state.canonical.g92_offset_enable = gcode.command == "G92.2";
            }
            "G92.3" => self.state.lock().canonical.g92_offset_enable = true,
            "M0" | "M1" | "M2" | "M30" => self.handle_program_stop().await?,
            "M3" => self.handle_spindle(&gcode, SpindleDirection::Cw).await?,
            "M4" => self.handle_spindle(&gcode, SpindleDirection::Ccw).await?,
            "M5" => self.handle_spindle(&gcode, SpindleDirection::Off).await?,
            "M48" => self.state.lock().canonical.m48_enable = true,
            "M49" => self.state.lock().canonical.m48_enable = false,
            "M50" => {
                let mut state = self.state.lock();
                state.canonical.mfo_enable = param(&gcode, 'P').map(|p| p != 0.0).unwrap_or(true);
            }
            _ => warn!("unhandled G-code command: {}", gcode.command),
        }
        Ok(())
    }

    async fn handle_linear_move(&mut self, gcode: &GCode, is_feed: bool) -> Result<()> {
        let mut state = self.state.lock();
        let cm = &mut state.canonical;
        if is_feed {
            cm.gm.motion_mode = MotionMode::G1;
        } else {
            cm.gm.motion_mode = MotionMode::G0;
        }

        let mut display_target = [0.0f32; MAX_AXES];
        for axis in 0..MAX_AXES {
            display_target[axis] = cm.display_position(axis);
        }
        for (key, value) in &gcode.params {
            let axis = match key {
                'X' => Some(0),
                'Y' => Some(1),
                'Z' => Some(2),
                'A' => Some(3),
                _ => None,
            };
            if let Some(axis) = axis {
                display_target[axis] = match cm.gm.distance_mode {
                    DistanceMode::Absolute => *value,
                    DistanceMode::Incremental => display_target[axis] + value,
                };
            }
        }
        if let Some(feed) = param(gcode, 'F') {
            cm.gm.feed_rate = feed;
        }

        let machine_target = cm.translate_target(display_target);
        if let Err((axis, high_end)) = cm.check_soft_limits(&machine_target) {
            anyhow::bail!("soft limit exceeded on axis {} ({})", axis, if high_end { "max" } else { "min" });
        }

        let start_v = 0.0;
        let end_v = if is_feed { cm.gm.feed_rate / 60.0 } else { 0.0 };
        let position = cm.position;
        let steps = self.kinematics.inverse_kinematics(&cm.gm, &machine_target, &position, start_v, end_v, self.segment_time);
        cm.position = machine_target;
        drop(state);

        let mut channels = [ChannelLoad::default(); MAX_MOTORS];
        for (channel, &step) in channels.iter_mut().zip(steps.iter()) {
            channel.direction_positive = step >= 0;
            channel.steps = step.unsigned_abs();
            channel.rate = if self.segment_time > 0.0 { (channel.steps as f32 / self.segment_time) as u32 } else { 0 };
        }
        let queue_move = QueueMove { channels, hi_tier_ticks: (self.segment_time * 1_000_000.0) as u32, is_end_of_block: true };
        self.mcu_tx.send(McuCommand::QueueMove(queue_move)).await?;
        Ok(())
    }

    async fn handle_home(&mut self) -> Result<()> {
        info!("homing axes");
        self.mcu_tx.send(McuCommand::QueueFlush).await?;
        let mut state = self.state.lock();
        state.canonical.position = [0.0; MAX_AXES];
        state.canonical.homing_state = true;
        Ok(())
    }

    /// `G92`: sets the display position to the given value by solving for
    /// the `g92_offset` that makes it so, leaving the machine position and
    /// the coordinate-system/tool offsets untouched.
    fn handle_set_offset(&mut self, gcode: &GCode) {
        let mut state = self.state.lock();
        let cm = &mut state.canonical;
        let coord = cm.gm.coord_system as usize;
        for (key, value) in &gcode.params {
            let axis = match key {
                'X' => Some(0),
                'Y' => Some(1),
                'Z' => Some(2),
                _ => None,
            };
            if let Some(axis) = axis {
                let base_offset = cm.coord_offset[coord][axis] + cm.tool_offset[axis];
                cm.g92_offset[axis] = cm.position[axis] - base_offset - *value;
            }
        }
        cm.g92_offset_enable = true;
    }

    async fn handle_program_stop(&mut self) -> Result<()> {
        warn!("program stop requested");
        self.mcu_tx.send(McuCommand::Feedhold).await?;
        self.state.lock().canonical.program_end();
        Ok(())
    }

    async fn handle_spindle(&mut self, gcode: &GCode, direction: SpindleDirection) -> Result<()> {
        let mut state = self.state.lock();
        state.canonical.gm.spindle_direction = direction;
        if let Some(speed) = param(gcode, 'S') {
            state.canonical.gm.spindle_speed = speed;
        }
        Ok(())
    }
}
