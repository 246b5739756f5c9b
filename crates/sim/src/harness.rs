//! Simulation Harness Utilities
//!
//! Drives a `SimMcu` connection with the real `mc-proto` wire format and
//! records a trace of every frame exchanged. Traced messages are owned,
//! serializable copies of the real `Command`/`Response` values (which
//! borrow from the frame buffer and aren't `Serialize`), decoded once at
//! receive time so the trace can be dumped to JSON for inspection.

use anyhow::{bail, Result};
use mc_proto::commands::{Command, ConfigValue, Message, Response, StatusCode};
use mc_proto::parser::{encode, Parser};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write as _;
use std::path::Path;
use std::process::ExitStatus;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDirection {
    HostToMcu,
    McuToHost,
}

/// A debug-formatted command or response, owned so it can outlive the
/// borrowed frame it was decoded from and be serialized into a trace file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TraceMessage {
    Command(String),
    Response(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub direction: TraceDirection,
    pub seq: u8,
    pub message: TraceMessage,
}

/// An owned copy of `mc_proto::commands::Response`, decoded immediately so
/// callers aren't stuck holding a borrow into the harness's read buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum SimResponse {
    Identify { protocol_version: u8, firmware_build: Vec<u8> },
    Status { tick: u32, payload: Vec<u8> },
    ConfigValue { token: String, value: ConfigValue },
    Ack,
    Error { code: StatusCode, external_number: u8 },
    Unknown(u8, Vec<u8>),
}

impl<'a> From<Response<'a>> for SimResponse {
    fn from(response: Response<'a>) -> Self {
        match response {
            Response::Identify { protocol_version, firmware_build } => {
                SimResponse::Identify { protocol_version, firmware_build: firmware_build.to_vec() }
            }
            Response::Status { tick, payload } => SimResponse::Status { tick, payload: payload.to_vec() },
            Response::ConfigValue { token, value } => {
                SimResponse::ConfigValue { token: token.as_str().to_string(), value }
            }
            Response::Ack => SimResponse::Ack,
            Response::Error { code, external_number } => SimResponse::Error { code, external_number },
            Response::Unknown(id, payload) => SimResponse::Unknown(id, payload.to_vec()),
        }
    }
}

/// The host side of the simulation: connects to a `SimMcu` socket, sends
/// commands, decodes responses, and records a trace of the exchange.
pub struct SimHost {
    socket_path: String,
    trace: Vec<TraceEntry>,
}

impl SimHost {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self { socket_path: socket_path.into(), trace: Vec::new() }
    }

    pub async fn connect(&self) -> Result<UnixStream> {
        UnixStream::connect(&self.socket_path).await.map_err(Into::into)
    }

    /// Encodes, sends, and traces `command`.
    pub async fn send_command(&mut self, stream: &mut UnixStream, command: Command<'_>, seq: u8) -> Result<()> {
        let mut buf = [0u8; 256];
        let len = encode(&Message::Command(command), seq, &mut buf)
            .map_err(|e| anyhow::anyhow!("failed to encode command: {e:?}"))?;
        stream.write_all(&buf[..len]).await?;
        self.record_trace(TraceDirection::HostToMcu, seq, TraceMessage::Command(format!("{command:?}")));
        Ok(())
    }

    /// Reads from `stream` until one complete frame parses, decodes it as a
    /// response, traces it, and returns the owned result. `read_buf`
    /// carries any bytes left over from a previous call across invocations.
    pub async fn recv_response(&mut self, stream: &mut UnixStream, read_buf: &mut Vec<u8>) -> Result<SimResponse> {
        let parser = Parser::new();
        let mut scratch = [0u8; 256];

        loop {
            match parser.parse(read_buf) {
                Ok(Some((Message::Response(response), consumed))) => {
                    let seq = 0;
                    let traced = TraceMessage::Response(format!("{response:?}"));
                    let sim_response = SimResponse::from(response);
                    read_buf.drain(..consumed);
                    self.record_trace(TraceDirection::McuToHost, seq, traced);
                    return Ok(sim_response);
                }
                Ok(Some((Message::Command(_), consumed))) => {
                    read_buf.drain(..consumed);
                    continue;
                }
                Ok(None) => {}
                Err((_, consumed)) => {
                    let consumed = consumed.min(read_buf.len());
                    let had_bytes = !read_buf.is_empty();
                    read_buf.drain(..consumed);
                    if had_bytes {
                        continue;
                    }
                }
            }
            let n = stream.read(&mut scratch).await?;
            if n == 0 {
                bail!("simulated MCU closed the connection while awaiting a response");
            }
            read_buf.extend_from_slice(&scratch[..n]);
        }
    }

    pub fn record_trace(&mut self, direction: TraceDirection, seq: u8, message: TraceMessage) {
        self.trace.push(TraceEntry { direction, seq, message });
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn dump_trace(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "dumping simulation trace");
        let mut file = File::create(path)?;
        let json = serde_json::to_string_pretty(&self.trace)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Runs a real host binary as an external process against this
    /// harness's socket, for exercising `mc-host` itself rather than
    /// driving the wire protocol directly from a test.
    #[instrument(skip(self))]
    pub async fn run_external_host(&mut self, host_binary_path: &str, gcode_file: &str) -> Result<ExitStatus> {
        info!(binary = %host_binary_path, "running external host process");
        let status = tokio::process::Command::new(host_binary_path)
            .arg("--mcu")
            .arg(&self.socket_path)
            .arg("--gcode")
            .arg(gcode_file)
            .status()
            .await?;
        Ok(status)
    }
}
