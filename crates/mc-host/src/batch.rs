//! Batch G-code Processor
//!
//! A CLI subcommand that replays a G-code file against the canonical
//! machine and the configured kinematics, printing the resulting motor
//! step counts, for testing and analysis without a live MCU connection.

use crate::config::PrinterConfig;
use crate::gcode::parse_gcode;
use anyhow::{Context, Result};
use clap::Parser;
use motion_core::canonical::{CanonicalMachine, DistanceMode, MotionMode};
use motion_core::{CartesianKinematics, Kinematics, MAX_AXES};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::info;

/// Arguments for the `batch` subcommand.
#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// Path to the G-code file to process.
    #[arg(required = true)]
    gcode_file: PathBuf,

    /// Path to the host configuration file.
    #[arg(short, long, default_value = "mc-host.cfg")]
    config_path: PathBuf,
}

/// Runs the batch processing logic.
pub async fn run_batch_processing(args: BatchArgs) -> Result<()> {
    info!("batch processing {:?}", args.gcode_file);

    let config = PrinterConfig::load(&args.config_path)?;
    let steps_per_unit = |token: &str| -> f32 {
        match config.tokens.get(token).map(|e| e.value) {
            Some(mc_proto::commands::ConfigValue::Float(v)) => v,
            Some(mc_proto::commands::ConfigValue::Int(v)) => v as f32,
            _ => 200.0,
        }
    };
    let mut kinematics = CartesianKinematics::new(
        [steps_per_unit("1sa"), steps_per_unit("2sa"), steps_per_unit("3sa"), 0.0, 0.0, 0.0],
        [0, 1, 2, -1, -1, -1],
    );
    let mut cm = CanonicalMachine::new();

    let file = File::open(&args.gcode_file).with_context(|| format!("failed to open G-code file: {:?}", args.gcode_file))?;
    let reader = BufReader::new(file);

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let Some(gcode) = parse_gcode(&line) else { continue };
        println!("\n[L{}] {:?}", line_num + 1, gcode);

        match gcode.command.as_str() {
            "G0" | "G1" => {
                cm.gm.motion_mode = if gcode.command == "G1" { MotionMode::G1 } else { MotionMode::G0 };
                let mut target = cm.position;
                for (key, value) in &gcode.params {
                    let axis = match key {
                        'X' => Some(0),
                        'Y' => Some(1),
                        'Z' => Some(2),
                        _ => None,
                    };
                    if let Some(axis) = axis {
                        target[axis] = match cm.gm.distance_mode {
                            DistanceMode::Absolute => *value,
                            DistanceMode::Incremental => target[axis] + value,
                        };
                    }
                }
                let position = cm.position;
                let steps = kinematics.inverse_kinematics(&cm.gm, &target, &position, 0.0, 0.0, 0.01);
                println!("  -> motor steps: {:?}", steps);
                cm.position = target;
            }
            "G28" => {
                println!("  -> home");
                cm.position = [0.0; MAX_AXES];
            }
            "G90" => cm.gm.distance_mode = DistanceMode::Absolute,
            "G91" => cm.gm.distance_mode = DistanceMode::Incremental,
            other => println!("  -> (not translated in batch mode: {other})"),
        }
    }

    info!("batch processing finished");
    Ok(())
}
