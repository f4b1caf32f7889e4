//! Byte framing between the host and the vehicle.
//!
//! Request (host -> vehicle): `[len][kind][params..]`, `len` counting
//! `kind` and `params`.
//! Response (vehicle -> host): `[len][type][payload..]`, `len` counting the
//! payload only. Type 0 carries a JSON telemetry snapshot.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use model::{Command, Direction, TelemetrySnapshot};
use serde_json::Value;

pub const REQUEST_HEADER_LEN: usize = 1;
pub const RESPONSE_HEADER_LEN: usize = 2;
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

pub const RESPONSE_STATISTICS: u8 = 0;

const KIND_NAVIGATE: u8 = 2;
const KIND_TH: u8 = 3;
const KIND_NIXIE: u8 = 4;
const KIND_SERVOS: u8 = 5;
const KIND_TRACE: u8 = 6;
const KIND_ULTRASONIC: u8 = 7;
const KIND_LED: u8 = 8;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unknown command kind {0}")]
    UnknownKind(u8),
    #[error("command kind {kind} needs {need} bytes, got {got}")]
    Truncated { kind: u8, need: usize, got: usize },
    #[error("empty frame")]
    Empty,
    #[error("payload of {0} bytes does not fit a frame")]
    TooLong(usize),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub fn direction_code(direction: Direction) -> u8 {
    match direction {
        Direction::Brake => 0,
        Direction::Left => 1,
        Direction::Right => 2,
        Direction::Forward => 3,
        Direction::BackWard => 4,
    }
}

/// Unknown codes brake.
pub fn direction_from_code(code: u8) -> Direction {
    match code {
        1 => Direction::Left,
        2 => Direction::Right,
        3 => Direction::Forward,
        4 => Direction::BackWard,
        _ => Direction::Brake,
    }
}

fn body_len(command: &Command) -> usize {
    match command {
        Command::Navigate { .. } | Command::Nixie { .. } => 3,
        _ => 2,
    }
}

pub fn encode_request(command: &Command) -> Bytes {
    let len = body_len(command);
    let mut buf = BytesMut::with_capacity(REQUEST_HEADER_LEN + len);
    buf.put_u8(len as u8);
    match *command {
        Command::Navigate { direction, speed } => {
            buf.put_u8(KIND_NAVIGATE);
            buf.put_u8(direction_code(direction));
            buf.put_u8(speed);
        }
        Command::Th { enabled } => {
            buf.put_u8(KIND_TH);
            buf.put_u8(enabled as u8);
        }
        Command::Nixie { enabled, brightness } => {
            buf.put_u8(KIND_NIXIE);
            buf.put_u8(enabled as u8);
            buf.put_u8(brightness);
        }
        Command::Servos { angle } => {
            buf.put_u8(KIND_SERVOS);
            buf.put_u8(angle);
        }
        Command::Trace { enabled } => {
            buf.put_u8(KIND_TRACE);
            buf.put_u8(enabled as u8);
        }
        Command::Ultrasonic { enabled } => {
            buf.put_u8(KIND_ULTRASONIC);
            buf.put_u8(enabled as u8);
        }
        Command::Led { enabled } => {
            buf.put_u8(KIND_LED);
            buf.put_u8(enabled as u8);
        }
    }
    buf.freeze()
}

/// Parses one request body (without its length byte).
pub fn decode_request(body: &[u8]) -> Result<Command, FrameError> {
    let (&kind, params) = body.split_first().ok_or(FrameError::Empty)?;
    let need = match kind {
        KIND_NAVIGATE | KIND_NIXIE => 2,
        KIND_TH | KIND_SERVOS | KIND_TRACE | KIND_ULTRASONIC | KIND_LED => 1,
        other => return Err(FrameError::UnknownKind(other)),
    };
    if params.len() < need {
        return Err(FrameError::Truncated { kind, need: need + 1, got: body.len() });
    }
    let flag = params[0] != 0;
    Ok(match kind {
        KIND_NAVIGATE => Command::Navigate { direction: direction_from_code(params[0]), speed: params[1] },
        KIND_NIXIE => Command::Nixie { enabled: flag, brightness: params[1] },
        KIND_TH => Command::Th { enabled: flag },
        KIND_SERVOS => Command::Servos { angle: params[0] },
        KIND_TRACE => Command::Trace { enabled: flag },
        KIND_ULTRASONIC => Command::Ultrasonic { enabled: flag },
        _ => Command::Led { enabled: flag },
    })
}

/// Pops one complete request frame off `buf`, if there is one.
pub fn split_request(buf: &mut BytesMut) -> Option<Result<Command, FrameError>> {
    let len = *buf.first()? as usize;
    if buf.len() < REQUEST_HEADER_LEN + len {
        return None;
    }
    buf.advance(REQUEST_HEADER_LEN);
    let body = buf.split_to(len);
    Some(decode_request(&body))
}

pub fn encode_response(snapshot: &TelemetrySnapshot) -> Result<Bytes, FrameError> {
    let payload = serde_json::to_vec(snapshot)?;
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::TooLong(payload.len()));
    }
    let mut buf = BytesMut::with_capacity(RESPONSE_HEADER_LEN + payload.len());
    buf.put_u8(payload.len() as u8);
    buf.put_u8(RESPONSE_STATISTICS);
    buf.put_slice(&payload);
    Ok(buf.freeze())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Raw snapshot record; shape checking is left to the bridge.
    Statistics(Value),
    Unknown(u8),
}

/// Reassembles response frames from a byte stream.
#[derive(Default)]
pub struct ResponseDecoder {
    buf: BytesMut,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next complete frame, or `None` until more bytes arrive. A frame whose
    /// payload fails to parse is consumed and reported as an error.
    pub fn next_frame(&mut self) -> Option<Result<Response, FrameError>> {
        if self.buf.len() < RESPONSE_HEADER_LEN {
            return None;
        }
        let len = self.buf[0] as usize;
        if self.buf.len() < RESPONSE_HEADER_LEN + len {
            return None;
        }
        let kind = self.buf[1];
        self.buf.advance(RESPONSE_HEADER_LEN);
        let payload = self.buf.split_to(len);
        Some(match kind {
            RESPONSE_STATISTICS => serde_json::from_slice(&payload).map(Response::Statistics).map_err(Into::into),
            other => Ok(Response::Unknown(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_frame_layout() {
        let frame = encode_request(&Command::Navigate { direction: Direction::Forward, speed: 60 });
        assert_eq!(&frame[..], &[3, KIND_NAVIGATE, 3, 60]);

        let frame = encode_request(&Command::Nixie { enabled: true, brightness: 5 });
        assert_eq!(&frame[..], &[3, KIND_NIXIE, 1, 5]);

        let frame = encode_request(&Command::Led { enabled: false });
        assert_eq!(&frame[..], &[2, KIND_LED, 0]);
    }

    #[test]
    fn split_request_waits_for_whole_frame() {
        let mut buf = BytesMut::from(&[3u8, KIND_NAVIGATE, 1][..]);
        assert!(split_request(&mut buf).is_none());
        buf.extend_from_slice(&[40, 2, KIND_SERVOS, 45]);

        let first = split_request(&mut buf).unwrap().unwrap();
        assert_eq!(first, Command::Navigate { direction: Direction::Left, speed: 40 });
        let second = split_request(&mut buf).unwrap().unwrap();
        assert_eq!(second, Command::Servos { angle: 45 });
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_request_errors() {
        assert!(matches!(decode_request(&[]), Err(FrameError::Empty)));
        assert!(matches!(decode_request(&[42, 1]), Err(FrameError::UnknownKind(42))));
        assert!(matches!(
            decode_request(&[KIND_NIXIE, 1]),
            Err(FrameError::Truncated { kind: KIND_NIXIE, need: 3, got: 2 })
        ));
    }

    #[test]
    fn unknown_direction_brakes() {
        assert_eq!(
            decode_request(&[KIND_NAVIGATE, 99, 20]).unwrap(),
            Command::Navigate { direction: Direction::Brake, speed: 20 }
        );
    }

    #[test]
    fn response_decoder_handles_split_and_batched_frames() {
        let snapshot = TelemetrySnapshot { th: Some((21.0, 40.0)), ..Default::default() };
        let frame = encode_response(&snapshot).unwrap();

        let mut dec = ResponseDecoder::new();
        dec.extend(&frame[..5]);
        assert!(dec.next_frame().is_none());
        dec.extend(&frame[5..]);
        dec.extend(&[0, 9]);
        dec.extend(&frame);

        match dec.next_frame() {
            Some(Ok(Response::Statistics(v))) => {
                let back: TelemetrySnapshot = serde_json::from_value(v).unwrap();
                assert_eq!(back, snapshot);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(dec.next_frame(), Some(Ok(Response::Unknown(9)))));
        assert!(matches!(dec.next_frame(), Some(Ok(Response::Statistics(_)))));
        assert!(dec.next_frame().is_none());
        assert_eq!(dec.buffered(), 0);
    }

    #[test]
    fn bad_json_frame_is_consumed() {
        let mut dec = ResponseDecoder::new();
        dec.extend(&[3, RESPONSE_STATISTICS, b'{', b'x', b'}']);
        assert!(matches!(dec.next_frame(), Some(Err(FrameError::Json(_)))));
        assert_eq!(dec.buffered(), 0);
    }
}
