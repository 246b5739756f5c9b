//! MCU Client
//!
//! Owns the serial connection to the MCU: encodes outgoing `mc-proto`
//! commands and writes them to the port, and runs a streaming `Parser` over
//! incoming bytes to decode responses (status reports, config echoes, acks,
//! structured errors) and fold them into the shared `MachineState`.

use crate::config::McuConfig;
use crate::state::{ConnectionStatus, MachineState, TokenValue};
use anyhow::{Context, Result};
use bytes::BytesMut;
use mc_proto::commands::{Command, ConfigValue, Message, Response, StatusCode};
use mc_proto::parser::{encode, Parser};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc::Receiver;
use tokio::time::sleep;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{error, info, warn};

/// The main task for the real MCU client: connects, runs the comm loop, and
/// reconnects with a fixed backoff on any I/O error.
pub async fn run_mcu_client(config: McuConfig, mcu_rx: Receiver<Command<'static>>, state: Arc<Mutex<MachineState>>) {
    info!("connecting to MCU at {} ({} baud)", config.serial_port, config.baud_rate);
    let mut mcu_rx = mcu_rx;

    loop {
        match tokio_serial::new(&config.serial_port, config.baud_rate).open_native_async() {
            Ok(port) => {
                info!("connected to MCU");
                {
                    let mut locked = state.lock();
                    locked.connection = ConnectionStatus::Ready;
                    locked.status_message = "connected".to_string();
                }
                if let Err(e) = mcu_comm_loop(port, &mut mcu_rx, state.clone()).await {
                    error!("MCU communication error: {e}. reconnecting.");
                }
            }
            Err(e) => {
                let msg = format!("failed to connect to MCU: {e}. retrying in 5s.");
                warn!("{msg}");
                let mut locked = state.lock();
                locked.connection = ConnectionStatus::Disconnected;
                locked.status_message = msg;
            }
        }
        sleep(Duration::from_secs(5)).await;
    }
}

/// Reads and writes concurrently over one serial port: writes drain
/// `mcu_rx`, reads run a streaming parser over the input buffer.
async fn mcu_comm_loop(mut port: SerialStream, mcu_rx: &mut Receiver<Command<'static>>, state: Arc<Mutex<MachineState>>) -> Result<()> {
    let parser = Parser::new();
    let mut read_buf = BytesMut::with_capacity(512);
    let mut scratch = [0u8; 256];
    let mut seq: u8 = 0;

    loop {
        tokio::select! {
            maybe_command = mcu_rx.recv() => {
                let Some(command) = maybe_command else {
                    info!("MCU command channel closed, exiting comm loop");
                    break;
                };
                let mut frame = [0u8; 256];
                let message = Message::Command(command);
                let len = encode(&message, seq, &mut frame).context("encoding outbound frame")?;
                seq = seq.wrapping_add(1);
                port.write_all(&frame[..len]).await.context("writing to MCU")?;
            }
            read_result = port.read(&mut scratch) => {
                let n = read_result.context("reading from MCU")?;
                if n == 0 {
                    anyhow::bail!("MCU serial port closed");
                }
                read_buf.extend_from_slice(&scratch[..n]);
                drain_frames(&parser, &mut read_buf, &state);
            }
        }
    }
    Ok(())
}

fn drain_frames(parser: &Parser, buf: &mut BytesMut, state: &Arc<Mutex<MachineState>>) {
    loop {
        match parser.parse(&buf[..]) {
            Ok(Some((message, consumed))) => {
                if let Message::Response(response) = message {
                    apply_response(state, &response);
                }
                let _ = buf.split_to(consumed);
            }
            Ok(None) => break,
            Err((_err, consumed)) => {
                let _ = buf.split_to(consumed.min(buf.len()));
                if buf.is_empty() {
                    break;
                }
            }
        }
    }
}

fn apply_response(state: &Arc<Mutex<MachineState>>, response: &Response) {
    let mut locked = state.lock();
    match response {
        Response::Status { payload, .. } => decode_status_payload(&mut locked, payload),
        Response::ConfigValue { token, value } => {
            locked.last_report.insert(token.as_str().to_string(), to_token_value(*value));
        }
        Response::Error { code, external_number } => {
            locked.status_message = format!("MCU error {code:?} on external #{external_number}");
            if *code == StatusCode::PersistenceError {
                error!("MCU reported a persistence error");
            }
        }
        Response::Ack | Response::Identify { .. } | Response::Unknown(..) => {}
    }
}

fn to_token_value(value: ConfigValue) -> TokenValue {
    match value {
        ConfigValue::Int(v) => TokenValue::Int(v),
        ConfigValue::Float(v) => TokenValue::Float(v),
        ConfigValue::Bool(v) => TokenValue::Bool(v),
    }
}

/// The status-report payload is an opaque blob of fixed-width fields the
/// host interprets against the tokens it configured verbosity for; this
/// minimal decode reads the first field as the tick-local machine status.
fn decode_status_payload(state: &mut MachineState, payload: &[u8]) {
    if payload.len() >= 4 {
        let stat = i32::from_be_bytes(payload[0..4].try_into().expect("checked len"));
        state.last_report.insert("stat".to_string(), TokenValue::Int(stat));
    }
}

/// A minimal in-process MCU stand-in for development without hardware:
/// acknowledges every command and never emits spontaneous status reports.
pub async fn run_mock_mcu(mut mcu_rx: Receiver<Command<'static>>, state: Arc<Mutex<MachineState>>) {
    info!("mock MCU running");
    {
        let mut locked = state.lock();
        locked.connection = ConnectionStatus::Ready;
        locked.status_message = "connected (mock MCU)".to_string();
    }

    while let Some(command) = mcu_rx.recv().await {
        info!("[mock MCU] received {:?}", command);
        sleep(Duration::from_millis(5)).await;
    }
}
