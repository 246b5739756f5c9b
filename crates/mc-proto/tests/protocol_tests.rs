//! Full-surface round-trip coverage: every `Command`/`Response` variant
//! survives `encode` -> `Parser::parse` unchanged.

use mc_proto::commands::{
    ChannelLoad, Command, ConfigToken, ConfigValue, Message, QueueMove, Response, StatusCode,
    Verbosity, MAX_MOTORS,
};
use mc_proto::parser::{encode, Parser};

fn roundtrip(message: Message) {
    let mut buffer = [0u8; 256];
    let len = encode(&message, 1, &mut buffer).unwrap();

    let parser = Parser::new();
    let (decoded, consumed) = parser.parse(&buffer[..len]).unwrap().unwrap();

    assert_eq!(message, decoded);
    assert_eq!(consumed, len, "parser should consume exactly one frame");
}

#[test]
fn roundtrip_identify() {
    roundtrip(Message::Command(Command::Identify { protocol_version: 3 }));
}

#[test]
fn roundtrip_get_config() {
    roundtrip(Message::Command(Command::GetConfig));
}

#[test]
fn roundtrip_get_status() {
    roundtrip(Message::Command(Command::GetStatus));
}

#[test]
fn roundtrip_set_status_verbosity() {
    roundtrip(Message::Command(Command::SetStatusVerbosity(Verbosity::Filtered)));
}

#[test]
fn roundtrip_queue_move() {
    let mut channels = [ChannelLoad::default(); MAX_MOTORS];
    channels[0] = ChannelLoad { rate: 48_000, direction_positive: true, steps: 2000 };
    channels[1] = ChannelLoad { rate: 0, direction_positive: false, steps: 0 };
    roundtrip(Message::Command(Command::QueueMove(QueueMove {
        channels,
        hi_tier_ticks: 1_000_000,
        is_end_of_block: false,
    })));
}

#[test]
fn roundtrip_feedhold_and_cycle_start() {
    roundtrip(Message::Command(Command::Feedhold));
    roundtrip(Message::Command(Command::CycleStart));
}

#[test]
fn roundtrip_queue_flush() {
    roundtrip(Message::Command(Command::QueueFlush));
}

#[test]
fn roundtrip_config_get_and_set() {
    roundtrip(Message::Command(Command::ConfigGet { token: ConfigToken::from_str("xvm") }));
    roundtrip(Message::Command(Command::ConfigSet {
        token: ConfigToken::from_str("1mi"),
        value: ConfigValue::Int(16),
    }));
    roundtrip(Message::Command(Command::ConfigSet {
        token: ConfigToken::from_str("g54x"),
        value: ConfigValue::Float(12.75),
    }));
    roundtrip(Message::Command(Command::ConfigSet {
        token: ConfigToken::from_str("1mi"),
        value: ConfigValue::Bool(true),
    }));
}

#[test]
fn roundtrip_digital_and_pwm_output() {
    roundtrip(Message::Command(Command::DigitalOutputSet { external_number: 4, value: true }));
    roundtrip(Message::Command(Command::PwmOutputSet { external_number: 2, duty: 32_768 }));
}

#[test]
fn roundtrip_reset() {
    roundtrip(Message::Command(Command::Reset));
}

#[test]
fn roundtrip_response_identify() {
    let build = b"v1.2.3";
    roundtrip(Message::Response(Response::Identify { protocol_version: 3, firmware_build: build }));
}

#[test]
fn roundtrip_response_status_payload() {
    let payload = [1u8, 2, 3, 4, 5];
    roundtrip(Message::Response(Response::Status { tick: 123_456, payload: &payload }));
}

#[test]
fn roundtrip_response_config_value() {
    roundtrip(Message::Response(Response::ConfigValue {
        token: ConfigToken::from_str("xvm"),
        value: ConfigValue::Float(1500.0),
    }));
}

#[test]
fn roundtrip_response_ack() {
    roundtrip(Message::Response(Response::Ack));
}

#[test]
fn roundtrip_response_error_carries_external_number() {
    roundtrip(Message::Response(Response::Error {
        code: StatusCode::SoftLimitExceeded,
        external_number: 7,
    }));
}

#[test]
fn buffer_too_small_is_rejected_without_panicking() {
    let message = Message::Command(Command::GetConfig);
    let mut tiny = [0u8; 2];
    let result = encode(&message, 1, &mut tiny);
    assert_eq!(result, Err(mc_proto::Error::BufferTooSmall));
}
