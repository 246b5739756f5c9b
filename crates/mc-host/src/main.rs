//! # mc-host
//!
//! The non-embedded side of the motion-control stack: owns the canonical
//! machine and the config-token store, dispatches the G-code subset,
//! journals configuration through the persistence layer, and talks
//! `mc-proto` to `mc-firmware` over a serial link (or a mock MCU during
//! development).
//!
//! ## Responsibilities
//!
//! * Parsing G-code from the API, a Unix socket, or a batch file.
//! * Translating motion words through the configured kinematics.
//! * Owning the config-token registry and its persisted storage.
//! * Serving a REST/WebSocket status API.
//!
//! ## Concurrency
//!
//! Each responsibility runs as its own `tokio` task: the G-code dispatcher,
//! the MCU client, the virtual-printer socket listener, and the API server
//! all communicate through channels and a shared `Mutex<MachineState>`.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

mod api;
mod batch;
mod config;
mod gcode;
mod mcu_client;
mod persistence;
mod state;
mod virtual_printer;

use config::PrinterConfig;
use state::MachineState;

/// Host process for the motion-control stack.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the host server: dispatcher, MCU link, virtual printer, API.
    Run(RunArgs),
    /// Process a G-code file in a batch and print the resulting MCU commands.
    Batch(batch::BatchArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the host configuration file.
    #[arg(short, long, default_value = "mc-host.cfg")]
    config_path: PathBuf,

    /// Directory for the rotating persistence files.
    #[arg(long, default_value = "persist")]
    persist_dir: PathBuf,

    /// Run with an in-process mock MCU instead of a real serial link.
    #[arg(long)]
    mock_mcu: bool,

    /// Web server port for the status API.
    #[arg(short, long, default_value_t = 7125)]
    web_port: u16,

    /// Path to the virtual printer Unix domain socket.
    #[arg(long, default_value = "/tmp/mc-host-printer")]
    socket_path: String,
}

#[actix_rt::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_server(args).await,
        Commands::Batch(args) => batch::run_batch_processing(args).await,
    }
}

async fn run_server(args: RunArgs) -> Result<()> {
    info!("starting mc-host server");

    let mut app_config = PrinterConfig::load(&args.config_path)?;
    let mut persistence_store = persistence::PersistenceStore::open(&args.persist_dir)?;
    if let Some(saved) = persistence_store.load()? {
        for (token, value) in saved {
            let _ = app_config.tokens.set(&token, value);
        }
        info!("restored config tokens from persistence");
    }
    let app_config = Arc::new(app_config);

    let machine_state = Arc::new(Mutex::new(MachineState::new()));

    let (gcode_tx, gcode_rx) = mpsc::channel(100);
    let (mcu_tx, mcu_rx) = mpsc::channel(100);

    let mut gcode_dispatcher = gcode::GCodeDispatcher::new(app_config.clone(), machine_state.clone(), mcu_tx);
    tokio::spawn(async move {
        gcode_dispatcher.run(gcode_rx).await;
    });
    info!("G-code dispatcher started");

    if args.mock_mcu {
        info!("using mock MCU");
        tokio::spawn(mcu_client::run_mock_mcu(mcu_rx, machine_state.clone()));
    } else {
        info!("connecting to MCU");
        tokio::spawn(mcu_client::run_mcu_client(app_config.mcu.clone(), mcu_rx, machine_state.clone()));
    }
    info!("MCU client started");

    let socket_gcode_tx = gcode_tx.clone();
    let socket_path = args.socket_path.clone();
    tokio::spawn(async move {
        if let Err(e) = virtual_printer::start_virtual_printer(&socket_path, socket_gcode_tx).await {
            tracing::error!("virtual printer socket failed: {e}");
        }
    });

    let api_state = api::AppState { machine_state: machine_state.clone(), gcode_sender: gcode_tx.clone() };
    let api_server = api::start_api_server(args.web_port, api_state)?;
    info!("API server started on port {}", args.web_port);

    tokio::select! {
        _ = api_server => {
            info!("API server shut down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // Persist the (possibly-changed) config-token registry before exiting.
    let snapshot: std::collections::BTreeMap<String, mc_proto::commands::ConfigValue> =
        app_config.tokens.iter().map(|(token, entry)| (token.to_string(), entry.value)).collect();
    persistence_store.save(&snapshot)?;

    let _ = std::fs::remove_file(&args.socket_path);
    Ok(())
}
