//! Virtual Printer Unix Domain Socket
//!
//! A Unix socket that accepts line-oriented G-code the way a serial port
//! would, for G-code senders that expect to talk to a device node rather
//! than calling the REST API.

use crate::gcode::{parse_gcode, GCode};
use anyhow::Result;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc::Sender;
use tracing::{error, info};

async fn handle_client(stream: UnixStream, gcode_sender: Sender<GCode>) {
    info!("client connected to virtual printer socket");
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line_buf = String::new();

    loop {
        match reader.read_line(&mut line_buf).await {
            Ok(0) => {
                info!("client disconnected from socket");
                break;
            }
            Ok(_) => {
                let line = line_buf.trim();
                if !line.is_empty() {
                    if let Some(gcode) = parse_gcode(line) {
                        if let Err(e) = gcode_sender.send(gcode).await {
                            error!("failed to send G-code from socket to dispatcher: {e}");
                            break;
                        }
                    }
                    if let Err(e) = writer.write_all(b"ok\n").await {
                        error!("failed to write 'ok' to socket: {e}");
                        break;
                    }
                }
                line_buf.clear();
            }
            Err(e) => {
                error!("failed to read from socket: {e}");
                break;
            }
        }
    }
}

/// Starts the Unix domain socket listener, replacing any stale socket file
/// left behind by a previous run.
pub async fn start_virtual_printer(path: &str, gcode_sender: Sender<GCode>) -> Result<()> {
    if Path::new(path).exists() {
        let _ = std::fs::remove_file(path);
        info!("removed existing socket file at {path}");
    }

    let listener = UnixListener::bind(path).map_err(|e| anyhow::anyhow!("failed to bind to socket {path}: {e}"))?;
    info!("virtual printer socket listening on {path}");

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let sender = gcode_sender.clone();
                tokio::spawn(handle_client(stream, sender));
            }
            Err(e) => {
                error!("failed to accept client connection on socket: {e}");
            }
        }
    }
}
