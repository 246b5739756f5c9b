//! Simulated MCU
//!
//! Listens on a Unix socket and speaks the real `mc-proto` binary frame
//! protocol. Queued moves run through an actual `dda_stepper::DdaEngine`
//! instead of a canned response, so a host-side integration test exercises
//! genuine pulse-generation behavior rather than a JSON stand-in for it.
//! Feedhold defers any move that arrives while held and replays it on
//! cycle-start, matching `Command::Feedhold`'s "queue is retained for
//! resume" contract.

use anyhow::{Context, Result};
use core::cell::RefCell;
use critical_section::Mutex;
use dda_stepper::{AtomicGpioPort, DdaChannelLoad, DdaEngine, PreppedSegment, Timer, MAX_MOTORS};
use mc_proto::commands::{Command, ConfigToken, ConfigValue, Message, QueueMove, Response, StatusCode};
use mc_proto::parser::{encode, Parser};
use std::collections::BTreeMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

#[derive(Debug, Default)]
struct RecordingGpioPort {
    state: u8,
}

impl AtomicGpioPort for RecordingGpioPort {
    fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8) {
        self.state |= set_mask;
        self.state &= !clear_mask;
    }

    fn write(&mut self, mask: u8) {
        self.state = mask;
    }
}

/// Ticks are driven synchronously by the command loop below rather than a
/// real timer interrupt, so scheduling is a no-op here.
#[derive(Debug, Default)]
struct NullTimer;

impl Timer for NullTimer {
    fn schedule_next(&mut self, _ticks: u16) {}
    fn trigger_now(&mut self) {}
    fn stop(&mut self) {}
}

/// One connection's simulated firmware state.
struct McuState {
    engine: DdaEngine<MAX_MOTORS>,
    tokens: BTreeMap<[u8; 4], ConfigValue>,
    held: bool,
    block_open: bool,
    deferred: Vec<QueueMove>,
    step_port: Mutex<RefCell<RecordingGpioPort>>,
    dir_port: Mutex<RefCell<RecordingGpioPort>>,
    timer: Mutex<RefCell<NullTimer>>,
}

impl McuState {
    fn new() -> Self {
        let mut tokens = BTreeMap::new();
        tokens.insert(ConfigToken::from_str("xvm").0, ConfigValue::Float(1200.0));
        tokens.insert(ConfigToken::from_str("1sa").0, ConfigValue::Float(200.0));
        Self {
            engine: DdaEngine::new(),
            tokens,
            held: false,
            block_open: false,
            deferred: Vec::new(),
            step_port: Mutex::new(RefCell::new(RecordingGpioPort::default())),
            dir_port: Mutex::new(RefCell::new(RecordingGpioPort::default())),
            timer: Mutex::new(RefCell::new(NullTimer)),
        }
    }

    /// Queues `qm` for later if a feedhold is in effect; otherwise runs it
    /// immediately.
    fn run_queue_move(&mut self, qm: &QueueMove) {
        if self.held {
            self.deferred.push(*qm);
            return;
        }
        self.execute_queue_move(qm);
    }

    /// Loads `qm` into the DDA engine and ticks it to completion, the way
    /// the firmware's HI tier would over many real timer interrupts, except
    /// driven synchronously since there's no wall clock to wait on here.
    fn execute_queue_move(&mut self, qm: &QueueMove) {
        let mut channels = [DdaChannelLoad::EMPTY; MAX_MOTORS];
        for (slot, channel) in channels.iter_mut().zip(qm.channels.iter()) {
            *slot = DdaChannelLoad {
                rate: channel.rate as i64,
                direction: channel.direction_positive,
                steps: channel.steps,
            };
        }
        let segment = PreppedSegment {
            channels,
            hi_tier_ticks: qm.hi_tier_ticks.max(1),
            is_end_of_block: qm.is_end_of_block,
            is_new_block: !self.block_open,
        };
        self.block_open = !qm.is_end_of_block;

        self.engine.prep(segment);
        if !self.engine.is_running() {
            self.engine.start();
        }
        for _ in 0..segment.hi_tier_ticks {
            self.engine.on_hi_tier_tick(&self.step_port, &self.dir_port, &self.timer);
        }
    }

    fn resume(&mut self) {
        self.held = false;
        let deferred = std::mem::take(&mut self.deferred);
        for qm in &deferred {
            self.execute_queue_move(qm);
        }
    }

    fn status_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(4 * MAX_MOTORS);
        for motor in 0..MAX_MOTORS {
            payload.extend_from_slice(&self.engine.position(motor).unwrap_or(0).to_be_bytes());
        }
        payload
    }
}

/// A simulated MCU: accepts connections on a Unix socket and answers the
/// real `mc-proto` frame protocol against an in-process `dda_stepper` engine.
pub struct SimMcu {
    socket_path: String,
}

impl SimMcu {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self { socket_path: socket_path.into() }
    }

    /// Runs the MCU simulation, accepting connections until the caller
    /// drops the returned future (typically via `tokio::spawn` + test
    /// teardown).
    pub async fn run(&self) -> Result<()> {
        let _ = std::fs::remove_file(&self.socket_path);
        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("failed to bind simulated MCU socket at {}", self.socket_path))?;
        info!(path = %self.socket_path, "simulated MCU listening");

        loop {
            let (stream, _) = listener.accept().await?;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream).await {
                    warn!("simulated MCU connection ended: {e}");
                }
            });
        }
    }
}

async fn handle_connection(mut stream: UnixStream) -> Result<()> {
    let mut state = McuState::new();
    let parser = Parser::new();
    let mut read_buf: Vec<u8> = Vec::new();
    let mut scratch = [0u8; 256];
    let mut out = [0u8; 256];

    loop {
        let n = stream.read(&mut scratch).await?;
        if n == 0 {
            return Ok(());
        }
        read_buf.extend_from_slice(&scratch[..n]);

        loop {
            let (message, consumed) = match parser.parse(&read_buf) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => break,
                Err((_, consumed)) => {
                    let consumed = consumed.min(read_buf.len());
                    let had_bytes = !read_buf.is_empty();
                    read_buf.drain(..consumed);
                    if had_bytes {
                        continue;
                    }
                    break;
                }
            };

            let Message::Command(command) = message else {
                read_buf.drain(..consumed);
                continue;
            };

            let status_payload = state.status_payload();
            let response = match command {
                Command::Identify { .. } => Some(Response::Identify { protocol_version: 1, firmware_build: b"sim-mcu" }),
                Command::GetConfig => None,
                Command::GetStatus => Some(Response::Status { tick: 0, payload: &status_payload }),
                Command::SetStatusVerbosity(_) => Some(Response::Ack),
                Command::QueueMove(qm) => {
                    state.run_queue_move(&qm);
                    Some(Response::Ack)
                }
                Command::Feedhold => {
                    state.held = true;
                    Some(Response::Ack)
                }
                Command::CycleStart => {
                    state.resume();
                    Some(Response::Ack)
                }
                Command::QueueFlush => {
                    state.deferred.clear();
                    state.block_open = false;
                    Some(Response::Ack)
                }
                Command::ConfigGet { token } => match state.tokens.get(&token.0) {
                    Some(&value) => Some(Response::ConfigValue { token, value }),
                    None => Some(Response::Error { code: StatusCode::ValueOutOfRange, external_number: 0 }),
                },
                Command::ConfigSet { token, value } => {
                    state.tokens.insert(token.0, value);
                    Some(Response::Ack)
                }
                Command::DigitalOutputSet { .. } | Command::PwmOutputSet { .. } => Some(Response::Ack),
                Command::Reset => {
                    state = McuState::new();
                    Some(Response::Ack)
                }
                Command::Unknown(id, payload) => Some(Response::Unknown(id, payload)),
            };

            if let Some(response) = response {
                let len = encode(&Message::Response(response), 0, &mut out)
                    .map_err(|e| anyhow::anyhow!("failed to encode simulated MCU response: {e:?}"))?;
                stream.write_all(&out[..len]).await?;
            }
            read_buf.drain(..consumed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_proto::commands::ChannelLoad;
    use std::time::Duration;

    #[tokio::test]
    async fn queue_move_advances_engine_position() {
        let socket_path = "/tmp/sim_mcu_test_queue_move.sock";
        let _ = std::fs::remove_file(socket_path);
        let sim_mcu = SimMcu::new(socket_path);
        tokio::spawn(async move {
            let _ = sim_mcu.run().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(socket_path).await.unwrap();
        let mut channels = [ChannelLoad::default(); MAX_MOTORS];
        channels[0] = ChannelLoad { rate: dda_stepper::DDA_SUBSTEPS as u32 / 4, direction_positive: true, steps: 10 };
        let command = Message::Command(Command::QueueMove(QueueMove { channels, hi_tier_ticks: 40, is_end_of_block: true }));

        let mut buf = [0u8; 64];
        let len = encode(&command, 1, &mut buf).unwrap();
        stream.write_all(&buf[..len]).await.unwrap();

        let mut response_buf = [0u8; 64];
        let n = stream.read(&mut response_buf).await.unwrap();
        let parser = Parser::new();
        let (parsed, _) = parser.parse(&response_buf[..n]).unwrap().unwrap();
        assert_eq!(parsed, Message::Response(Response::Ack));

        let status = Message::Command(Command::GetStatus);
        let len = encode(&status, 2, &mut buf).unwrap();
        stream.write_all(&buf[..len]).await.unwrap();
        let n = stream.read(&mut response_buf).await.unwrap();
        let (parsed, _) = parser.parse(&response_buf[..n]).unwrap().unwrap();
        let Message::Response(Response::Status { payload, .. }) = parsed else { panic!("expected a status response") };
        let motor0_position = i32::from_be_bytes(payload[0..4].try_into().unwrap());
        assert_eq!(motor0_position, 10);

        let _ = std::fs::remove_file(socket_path);
    }
}
