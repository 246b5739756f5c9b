#![cfg(test)]

use mc_proto::{
    commands::{Command, Message},
    crc::crc16_ccitt,
    parser::{encode, Parser, SYNC_BYTE},
};

/// Builds a frame by hand (independent of `encode`) so these tests also
/// exercise the wire layout itself, not just round-trip symmetry.
fn build_test_frame(seq: u8, command_id: u8, payload: &[u8]) -> Vec<u8> {
    let msg_len = 2 + payload.len() + 2; // SEQ + CMD_ID + payload + CRC16
    let mut frame = Vec::with_capacity(msg_len + 2);
    frame.push(SYNC_BYTE);
    frame.push(msg_len as u8);
    frame.push(seq);
    frame.push(command_id);
    frame.extend_from_slice(payload);

    let crc = crc16_ccitt(&frame[2..], msg_len - 2);
    frame.extend_from_slice(&crc.to_be_bytes());
    frame
}

#[test]
fn parse_get_config() {
    let frame = build_test_frame(1, 0x02, &[]);
    let parser = Parser::new();

    let (msg, consumed) = parser.parse(&frame).unwrap().unwrap();
    assert_eq!(consumed, frame.len());
    assert!(matches!(msg, Message::Command(Command::GetConfig)));
}

#[test]
fn parse_get_status() {
    let frame = build_test_frame(3, 0x03, &[]);
    let parser = Parser::new();
    let (msg, consumed) = parser.parse(&frame).unwrap().unwrap();
    assert_eq!(consumed, frame.len());
    assert!(matches!(msg, Message::Command(Command::GetStatus)));
}

#[test]
fn parse_with_leading_noise() {
    let frame = build_test_frame(3, 0x03, &[]);
    let mut buffer = vec![0x00, 0x01, 0x02, 0x03];
    buffer.extend_from_slice(&frame);
    let parser = Parser::new();

    let (msg, consumed) = parser.parse(&buffer).unwrap().unwrap();
    assert_eq!(consumed, buffer.len());
    assert!(matches!(msg, Message::Command(Command::GetStatus)));
}

#[test]
fn parse_multiple_messages_back_to_back() {
    let frame1 = build_test_frame(4, 0x02, &[]);
    let frame2 = build_test_frame(5, 0x03, &[]);
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&frame1);
    buffer.extend_from_slice(&frame2);

    let parser = Parser::new();

    let (msg1, consumed1) = parser.parse(&buffer).unwrap().unwrap();
    assert_eq!(consumed1, frame1.len());
    assert!(matches!(msg1, Message::Command(Command::GetConfig)));

    let (msg2, consumed2) = parser.parse(&buffer[consumed1..]).unwrap().unwrap();
    assert_eq!(consumed2, frame2.len());
    assert!(matches!(msg2, Message::Command(Command::GetStatus)));
}

#[test]
fn incomplete_frame_returns_none() {
    let frame = build_test_frame(6, 0x02, &[]);
    let parser = Parser::new();

    let result = parser.parse(&frame[..frame.len() - 1]);
    assert!(result.is_ok());
    assert!(result.unwrap().is_none());
}

#[test]
fn bad_crc_returns_err_and_discards_only_the_sync_byte() {
    let mut frame = build_test_frame(7, 0x02, &[]);
    let last = frame.len() - 1;
    frame[last] ^= 0xff;

    let parser = Parser::new();
    let result = parser.parse(&frame);
    assert!(result.is_err());
    let (err, consumed) = result.unwrap_err();
    assert_eq!(err, mc_proto::Error::InvalidCrc);
    assert_eq!(consumed, 1);
}

#[test]
fn no_sync_byte_discards_whole_buffer() {
    let buffer = vec![0x00, 0x01, 0x02, 0x03, 0x04];
    let parser = Parser::new();
    let result = parser.parse(&buffer);
    assert!(result.is_err());
    let (err, consumed) = result.unwrap_err();
    assert_eq!(err, mc_proto::Error::InvalidSync);
    assert_eq!(consumed, buffer.len());
}

#[test]
fn encode_then_parse_preserves_the_message() {
    let message = Message::Command(Command::CycleStart);
    let mut buf = [0u8; 64];
    let len = encode(&message, 9, &mut buf).unwrap();
    let parser = Parser::new();
    let (parsed, consumed) = parser.parse(&buf[..len]).unwrap().unwrap();
    assert_eq!(consumed, len);
    assert_eq!(parsed, message);
}
