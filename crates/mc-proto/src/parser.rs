#![deny(clippy::all)]
#![deny(warnings)]

//! A zero-copy, streaming frame parser plus a matching frame encoder.
//!
//! Frame layout: `SYNC(1) LEN(1) SEQ(1) CMD_ID(1) PAYLOAD(LEN-4) CRC16(2, be)`.
//! `LEN` counts everything from `SEQ` through the trailing CRC inclusive, so
//! a caller can skip straight to the next candidate frame without decoding
//! the payload.

use crate::{
    commands::{
        ids, ChannelLoad, Command, ConfigToken, ConfigValue, Message, QueueMove, Response,
        StatusCode, Verbosity, MAX_MOTORS,
    },
    crc::crc16_ccitt,
    Error,
};
use nom::{
    bytes::streaming::take,
    combinator::map,
    number::streaming::{be_u16, be_u32, u8},
    sequence::tuple,
    IResult,
};

/// The sync byte that marks the beginning of every frame.
pub const SYNC_BYTE: u8 = 0x1d;

/// Minimum frame size: SYNC + LEN + SEQ + CMD_ID + CRC16, zero payload.
const MIN_FRAME_LEN: usize = 6;

/// A parser for the host<->MCU binary protocol.
///
/// Zero-copy and `no_std`-friendly: it borrows slices out of the caller's
/// buffer rather than allocating, so it's suitable for use from an
/// interrupt handler or an async read loop alike.
#[derive(Debug, Default)]
pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to parse a single frame from the start of the given buffer.
    ///
    /// - `Ok(Some((message, consumed)))`: a valid frame was decoded.
    /// - `Ok(None)`: not enough bytes yet for a complete frame.
    /// - `Err((error, consumed))`: a recoverable framing error; the caller
    ///   should advance their buffer by `consumed` bytes and retry.
    pub fn parse<'a>(&self, input: &'a [u8]) -> Result<Option<(Message<'a>, usize)>, (Error, usize)> {
        let Some(sync_pos) = input.iter().position(|&b| b == SYNC_BYTE) else {
            return Err((Error::InvalidSync, input.len()));
        };
        let buffer = &input[sync_pos..];

        if buffer.len() < 2 {
            return Ok(None);
        }
        let msg_len = buffer[1] as usize;
        if msg_len < 4 {
            // SEQ + CMD_ID + CRC16 is the smallest possible body.
            return Err((Error::InvalidPayload, sync_pos + 1));
        }
        let frame_total = 2 + msg_len;
        if buffer.len() < frame_total {
            if frame_total > 255 + 2 {
                return Err((Error::BufferTooSmall, sync_pos + 1));
            }
            return Ok(None);
        }

        let body = &buffer[2..frame_total];
        let crc_len = msg_len - 2;
        let received_crc = u16::from_be_bytes([body[crc_len], body[crc_len + 1]]);
        let calculated_crc = crc16_ccitt(body, crc_len);
        if received_crc != calculated_crc {
            return Err((Error::InvalidCrc, sync_pos + 1));
        }

        let seq_and_cmd_and_payload = &body[..crc_len];
        match parse_message(seq_and_cmd_and_payload) {
            Ok((_rem, message)) => Ok(Some((message, sync_pos + frame_total))),
            Err(_) => Err((Error::InvalidPayload, sync_pos + 1)),
        }
    }
}

fn parse_message(input: &[u8]) -> IResult<&[u8], Message> {
    let (i, _seq) = u8(input)?;
    let (i, cmd_id) = u8(i)?;
    match cmd_id {
        ids::IDENTIFY => map(u8, |protocol_version| {
            Message::Command(Command::Identify { protocol_version })
        })(i),
        ids::GET_CONFIG => Ok((i, Message::Command(Command::GetConfig))),
        ids::GET_STATUS => Ok((i, Message::Command(Command::GetStatus))),
        ids::SET_STATUS_VERBOSITY => map(u8, |b| {
            Message::Command(Command::SetStatusVerbosity(Verbosity::from_byte(b)))
        })(i),
        ids::QUEUE_MOVE => parse_queue_move(i),
        ids::FEEDHOLD => Ok((i, Message::Command(Command::Feedhold))),
        ids::CYCLE_START => Ok((i, Message::Command(Command::CycleStart))),
        ids::QUEUE_FLUSH => Ok((i, Message::Command(Command::QueueFlush))),
        ids::CONFIG_GET => map(take(4usize), |token: &[u8]| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(token);
            Message::Command(Command::ConfigGet { token: ConfigToken(buf) })
        })(i),
        ids::CONFIG_SET => parse_config_set(i),
        ids::DIGITAL_OUTPUT_SET => map(tuple((u8, u8)), |(external_number, value)| {
            Message::Command(Command::DigitalOutputSet { external_number, value: value != 0 })
        })(i),
        ids::PWM_OUTPUT_SET => map(tuple((u8, be_u16)), |(external_number, duty)| {
            Message::Command(Command::PwmOutputSet { external_number, duty })
        })(i),
        ids::RESET => Ok((i, Message::Command(Command::Reset))),
        ids::RESP_IDENTIFY => map(tuple((u8, take(i.len().saturating_sub(1)))), |(protocol_version, firmware_build)| {
            Message::Response(Response::Identify { protocol_version, firmware_build })
        })(i),
        ids::RESP_STATUS => map(tuple((be_u32, take(i.len().saturating_sub(4)))), |(tick, payload)| {
            Message::Response(Response::Status { tick, payload })
        })(i),
        ids::RESP_CONFIG_VALUE => parse_resp_config_value(i),
        ids::RESP_ACK => Ok((i, Message::Response(Response::Ack))),
        ids::RESP_ERROR => map(tuple((u8, u8)), |(code, external_number)| {
            Message::Response(Response::Error { code: StatusCode::from_byte(code), external_number })
        })(i),
        other if other >= 0x80 => {
            let payload = i;
            Ok((&[], Message::Response(Response::Unknown(other, payload))))
        }
        other => Ok((&[], Message::Command(Command::Unknown(other, i)))),
    }
}

fn parse_queue_move(input: &[u8]) -> IResult<&[u8], Message> {
    let mut i = input;
    let mut channels = [ChannelLoad::default(); MAX_MOTORS];
    for channel in channels.iter_mut() {
        let (rest, (rate, direction_byte, steps)) = tuple((be_u32, u8, be_u32))(i)?;
        *channel = ChannelLoad { rate, direction_positive: direction_byte != 0, steps };
        i = rest;
    }
    let (i, hi_tier_ticks) = be_u32(i)?;
    let (i, end_byte) = u8(i)?;
    Ok((
        i,
        Message::Command(Command::QueueMove(QueueMove {
            channels,
            hi_tier_ticks,
            is_end_of_block: end_byte != 0,
        })),
    ))
}

fn parse_config_set(input: &[u8]) -> IResult<&[u8], Message> {
    let (i, token_bytes) = take(4usize)(input)?;
    let mut token_buf = [0u8; 4];
    token_buf.copy_from_slice(token_bytes);
    let (i, tag) = u8(i)?;
    let (i, value_bytes) = take(4usize)(i)?;
    let mut value_buf = [0u8; 4];
    value_buf.copy_from_slice(value_bytes);
    let value = ConfigValue::from_wire(tag, value_buf).unwrap_or(ConfigValue::Int(0));
    Ok((
        i,
        Message::Command(Command::ConfigSet { token: ConfigToken(token_buf), value }),
    ))
}

fn parse_resp_config_value(input: &[u8]) -> IResult<&[u8], Message> {
    let (i, token_bytes) = take(4usize)(input)?;
    let mut token_buf = [0u8; 4];
    token_buf.copy_from_slice(token_bytes);
    let (i, tag) = u8(i)?;
    let (i, value_bytes) = take(4usize)(i)?;
    let mut value_buf = [0u8; 4];
    value_buf.copy_from_slice(value_bytes);
    let value = ConfigValue::from_wire(tag, value_buf).unwrap_or(ConfigValue::Int(0));
    Ok((
        i,
        Message::Response(Response::ConfigValue { token: ConfigToken(token_buf), value }),
    ))
}

/// Encodes a message into `dst`, returning the number of bytes written, or
/// `Err(Error::BufferTooSmall)` if `dst` can't hold the frame.
///
/// `seq` is the caller-assigned sequence number echoed back in responses
/// that correlate to a request; the MCU side can use `0` for unsolicited
/// status reports.
pub fn encode(message: &Message, seq: u8, dst: &mut [u8]) -> Result<usize, Error> {
    let mut body = [0u8; 128];
    let body_len = encode_body(message, &mut body)?;

    let msg_len = 2 + body_len + 2; // SEQ + CMD_ID + payload + CRC16
    let frame_total = 2 + msg_len;
    if dst.len() < frame_total || msg_len > 255 {
        return Err(Error::BufferTooSmall);
    }

    dst[0] = SYNC_BYTE;
    dst[1] = msg_len as u8;
    dst[2] = seq;
    dst[3..3 + body_len].copy_from_slice(&body[..body_len]);

    let crc_region_len = msg_len - 2;
    let crc = crc16_ccitt(&dst[2..2 + crc_region_len], crc_region_len);
    dst[2 + crc_region_len..frame_total].copy_from_slice(&crc.to_be_bytes());

    Ok(frame_total)
}

/// Writes `[CMD_ID, ...payload]` into `dst`, returning the length written.
fn encode_body(message: &Message, dst: &mut [u8]) -> Result<usize, Error> {
    let mut w = Writer { dst, pos: 0 };
    match message {
        Message::Command(Command::Identify { protocol_version }) => {
            w.put_u8(ids::IDENTIFY)?;
            w.put_u8(*protocol_version)?;
        }
        Message::Command(Command::GetConfig) => w.put_u8(ids::GET_CONFIG)?,
        Message::Command(Command::GetStatus) => w.put_u8(ids::GET_STATUS)?,
        Message::Command(Command::SetStatusVerbosity(v)) => {
            w.put_u8(ids::SET_STATUS_VERBOSITY)?;
            w.put_u8(v.to_byte())?;
        }
        Message::Command(Command::QueueMove(qm)) => {
            w.put_u8(ids::QUEUE_MOVE)?;
            for channel in qm.channels.iter() {
                w.put_u32(channel.rate)?;
                w.put_u8(channel.direction_positive as u8)?;
                w.put_u32(channel.steps)?;
            }
            w.put_u32(qm.hi_tier_ticks)?;
            w.put_u8(qm.is_end_of_block as u8)?;
        }
        Message::Command(Command::Feedhold) => w.put_u8(ids::FEEDHOLD)?,
        Message::Command(Command::CycleStart) => w.put_u8(ids::CYCLE_START)?,
        Message::Command(Command::QueueFlush) => w.put_u8(ids::QUEUE_FLUSH)?,
        Message::Command(Command::ConfigGet { token }) => {
            w.put_u8(ids::CONFIG_GET)?;
            w.put_bytes(&token.0)?;
        }
        Message::Command(Command::ConfigSet { token, value }) => {
            w.put_u8(ids::CONFIG_SET)?;
            w.put_bytes(&token.0)?;
            let (tag, bytes) = value.to_wire();
            w.put_u8(tag)?;
            w.put_bytes(&bytes)?;
        }
        Message::Command(Command::DigitalOutputSet { external_number, value }) => {
            w.put_u8(ids::DIGITAL_OUTPUT_SET)?;
            w.put_u8(*external_number)?;
            w.put_u8(*value as u8)?;
        }
        Message::Command(Command::PwmOutputSet { external_number, duty }) => {
            w.put_u8(ids::PWM_OUTPUT_SET)?;
            w.put_u8(*external_number)?;
            w.put_u16(*duty)?;
        }
        Message::Command(Command::Reset) => w.put_u8(ids::RESET)?,
        Message::Command(Command::Unknown(id, payload)) => {
            w.put_u8(*id)?;
            w.put_bytes(payload)?;
        }
        Message::Response(Response::Identify { protocol_version, firmware_build }) => {
            w.put_u8(ids::RESP_IDENTIFY)?;
            w.put_u8(*protocol_version)?;
            w.put_bytes(firmware_build)?;
        }
        Message::Response(Response::Status { tick, payload }) => {
            w.put_u8(ids::RESP_STATUS)?;
            w.put_u32(*tick)?;
            w.put_bytes(payload)?;
        }
        Message::Response(Response::ConfigValue { token, value }) => {
            w.put_u8(ids::RESP_CONFIG_VALUE)?;
            w.put_bytes(&token.0)?;
            let (tag, bytes) = value.to_wire();
            w.put_u8(tag)?;
            w.put_bytes(&bytes)?;
        }
        Message::Response(Response::Ack) => w.put_u8(ids::RESP_ACK)?,
        Message::Response(Response::Error { code, external_number }) => {
            w.put_u8(ids::RESP_ERROR)?;
            w.put_u8(code.to_byte())?;
            w.put_u8(*external_number)?;
        }
        Message::Response(Response::Unknown(id, payload)) => {
            w.put_u8(*id)?;
            w.put_bytes(payload)?;
        }
    }
    Ok(w.pos)
}

struct Writer<'a> {
    dst: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.pos + bytes.len() > self.dst.len() {
            return Err(Error::BufferTooSmall);
        }
        self.dst[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    fn put_u8(&mut self, b: u8) -> Result<(), Error> {
        self.put_bytes(&[b])
    }

    fn put_u16(&mut self, v: u16) -> Result<(), Error> {
        self.put_bytes(&v.to_be_bytes())
    }

    fn put_u32(&mut self, v: u32) -> Result<(), Error> {
        self.put_bytes(&v.to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ChannelLoad;
    use std::vec::Vec;

    fn build_frame(message: &Message, seq: u8) -> Vec<u8> {
        let mut buf = [0u8; 256];
        let len = encode(message, seq, &mut buf).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn get_config_round_trips() {
        let message = Message::Command(Command::GetConfig);
        let frame = build_frame(&message, 1);
        let parser = Parser::new();
        let (parsed, consumed) = parser.parse(&frame).unwrap().unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(parsed, message);
    }

    #[test]
    fn queue_move_round_trips() {
        let mut channels = [ChannelLoad::default(); MAX_MOTORS];
        channels[0] = ChannelLoad { rate: 10_000, direction_positive: true, steps: 1600 };
        let message = Message::Command(Command::QueueMove(QueueMove {
            channels,
            hi_tier_ticks: 2_500_000,
            is_end_of_block: true,
        }));
        let frame = build_frame(&message, 7);
        let parser = Parser::new();
        let (parsed, consumed) = parser.parse(&frame).unwrap().unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(parsed, message);
    }

    #[test]
    fn config_set_round_trips_a_float_token() {
        let message = Message::Command(Command::ConfigSet {
            token: ConfigToken::from_str("xvm"),
            value: ConfigValue::Float(1200.0),
        });
        let frame = build_frame(&message, 2);
        let parser = Parser::new();
        let (parsed, _) = parser.parse(&frame).unwrap().unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn leading_noise_before_sync_is_skipped() {
        let message = Message::Command(Command::GetStatus);
        let frame = build_frame(&message, 3);
        let mut buffer: Vec<u8> = vec![0x00, 0x01, 0x02];
        buffer.extend_from_slice(&frame);
        let parser = Parser::new();
        let (parsed, consumed) = parser.parse(&buffer).unwrap().unwrap();
        assert_eq!(consumed, buffer.len());
        assert_eq!(parsed, message);
    }

    #[test]
    fn incomplete_frame_returns_none() {
        let message = Message::Command(Command::GetConfig);
        let frame = build_frame(&message, 1);
        let parser = Parser::new();
        let result = parser.parse(&frame[..frame.len() - 1]).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn corrupted_crc_is_rejected_and_only_the_sync_byte_is_discarded() {
        let message = Message::Command(Command::GetConfig);
        let mut frame = build_frame(&message, 1);
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        let parser = Parser::new();
        let result = parser.parse(&frame);
        assert_eq!(result, Err((Error::InvalidCrc, 1)));
    }

    #[test]
    fn buffer_with_no_sync_byte_is_entirely_discarded() {
        let buffer = [0x00u8, 0x01, 0x02, 0x03];
        let parser = Parser::new();
        let result = parser.parse(&buffer);
        assert_eq!(result, Err((Error::InvalidSync, buffer.len())));
    }

    #[test]
    fn status_response_carries_an_opaque_payload_blob() {
        let payload = [0xAAu8, 0xBB, 0xCC];
        let message = Message::Response(Response::Status { tick: 42, payload: &payload });
        let frame = build_frame(&message, 0);
        let parser = Parser::new();
        let (parsed, _) = parser.parse(&frame).unwrap().unwrap();
        assert_eq!(parsed, message);
    }
}
