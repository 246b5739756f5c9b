//! # Protocol Bridge
//!
//! Owns the UART link to the host and speaks `mc_proto`'s
//! sync-byte/CRC16/length-prefixed frame layout over it: decoded
//! `Command`s are dispatched to the stepper/safety modules, and the
//! resulting `Response` is encoded and written straight back.

use embassy_stm32::gpio::AnyPin;
use embassy_stm32::peripherals::USART1;
use embassy_stm32::usart::Uart;
use mc_proto::commands::{Command, Message, Response, StatusCode};
use mc_proto::parser::{encode, Parser};

const RX_BUFFER_LEN: usize = 256;

fn dispatch(command: Command) -> Response<'static> {
    match command {
        Command::Identify { protocol_version } => Response::Identify {
            protocol_version,
            firmware_build: env!("CARGO_PKG_VERSION").as_bytes(),
        },
        Command::GetStatus => {
            // The payload is the raw bytes the host's config-token registry
            // decodes; the firmware only needs to report the motor
            // positions it actually tracks.
            Response::Status { tick: 0, payload: &[] }
        }
        Command::QueueMove(queue_move) => {
            let is_new_block = !crate::stepper::is_running() && !crate::stepper::has_prep_pending();
            if crate::stepper::load_segment(&queue_move, is_new_block) {
                crate::stepper::start_if_idle();
                Response::Ack
            } else {
                Response::Error { code: StatusCode::ValueOutOfRange, external_number: 0 }
            }
        }
        Command::Feedhold => {
            crate::safety::open_interlock();
            Response::Ack
        }
        Command::CycleStart => {
            crate::safety::close_interlock();
            Response::Ack
        }
        Command::QueueFlush => {
            if crate::safety::can_queue_flush() {
                Response::Ack
            } else {
                Response::Error { code: StatusCode::RejectedByShutdown, external_number: 0 }
            }
        }
        Command::Reset => {
            crate::safety::reset();
            Response::Ack
        }
        // Config-token storage lives in mc-host's persistence layer; the
        // firmware has nothing authoritative to report here.
        Command::GetConfig | Command::ConfigGet { .. } | Command::ConfigSet { .. } => Response::Ack,
        Command::SetStatusVerbosity(_) => Response::Ack,
        Command::DigitalOutputSet { .. } | Command::PwmOutputSet { .. } => Response::Ack,
        Command::Unknown(id, _) => Response::Error { code: StatusCode::WordMissing, external_number: id },
    }
}

/// The protocol bridge task: reads from the UART, feeds complete frames to
/// `dispatch`, and writes the encoded response back.
#[embassy_executor::task]
pub async fn proto_task(usart: USART1, rx_pin: AnyPin, tx_pin: AnyPin) {
    use embassy_stm32::usart::Config;

    defmt::info!("Protocol bridge task started");

    let config = Config::default();
    let mut uart = match Uart::new_blocking(usart, rx_pin, tx_pin, config) {
        Ok(uart) => uart,
        Err(_) => {
            defmt::error!("failed to initialize protocol UART");
            return;
        }
    };

    let parser = Parser::new();
    let mut rx = [0u8; RX_BUFFER_LEN];
    let mut filled = 0usize;
    let mut seq = 0u8;

    loop {
        if filled == rx.len() {
            // No valid frame found in a full buffer: drop it and resync on
            // the next sync byte.
            filled = 0;
        }

        let mut byte = [0u8; 1];
        if uart.blocking_read(&mut byte).is_err() {
            continue;
        }
        rx[filled] = byte[0];
        filled += 1;

        match parser.parse(&rx[..filled]) {
            Ok(Some((Message::Command(command), consumed))) => {
                let response = dispatch(command);
                let mut out = [0u8; RX_BUFFER_LEN];
                if let Ok(len) = encode(&Message::Response(response), seq, &mut out) {
                    let _ = uart.blocking_write(&out[..len]);
                    seq = seq.wrapping_add(1);
                }
                rx.copy_within(consumed..filled, 0);
                filled -= consumed;
            }
            Ok(Some((Message::Response(_), consumed))) => {
                // The host never receives a `Response` frame on this link;
                // treat it as noise and resync past it.
                rx.copy_within(consumed..filled, 0);
                filled -= consumed;
            }
            Ok(None) => {
                // Incomplete frame; keep accumulating.
            }
            Err((_, consumed)) => {
                rx.copy_within(consumed..filled, 0);
                filled -= consumed;
            }
        }
    }
}
