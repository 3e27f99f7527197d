//! Wire framing for media-link traffic: `[type:1][seq:4 BE][payload:N]`.

use bytes::{Bytes, BytesMut};

/// A frame's type tag, the first byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Audio,
    Ping,
    Pong,
    /// Reserved for future control traffic; parsed but not acted on.
    Control,
}

impl FrameType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(FrameType::Audio),
            0x02 => Some(FrameType::Ping),
            0x03 => Some(FrameType::Pong),
            0x04 => Some(FrameType::Control),
            _ => None,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            FrameType::Audio => 0x01,
            FrameType::Ping => 0x02,
            FrameType::Pong => 0x03,
            FrameType::Control => 0x04,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub seq: u32,
    pub payload: Bytes,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FramerError {
    #[error("frame too short: got {0} bytes, need at least 5")]
    TooShort(usize),
    #[error("unknown frame type byte {0:#04x}")]
    UnknownType(u8),
}

/// Monotonic per-session sequence counter for outbound audio frames. Wraps
/// modulo 2^32 rather than panicking, matching unsigned wraparound on the
/// wire.
#[derive(Debug, Default)]
pub struct SequenceCounter(u32);

impl SequenceCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(&mut self) -> u32 {
        let current = self.0;
        self.0 = self.0.wrapping_add(1);
        current
    }
}

pub fn encode_audio(seq: u32, payload: Bytes) -> Bytes {
    encode(FrameType::Audio, seq, payload)
}

pub fn encode_ping(seq: u32) -> Bytes {
    encode(FrameType::Ping, seq, Bytes::new())
}

/// A ping carrying an 8-byte monotonic timestamp payload, so the peer's
/// pong can echo it back for RTT computation.
pub fn encode_ping_with_payload(seq: u32, payload: Bytes) -> Bytes {
    encode(FrameType::Ping, seq, payload)
}

/// `payload` is the 8-byte monotonic timestamp chosen by the pinger, echoed
/// verbatim.
pub fn encode_pong(seq: u32, ping_payload: Bytes) -> Bytes {
    encode(FrameType::Pong, seq, ping_payload)
}

fn encode(frame_type: FrameType, seq: u32, payload: Bytes) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + payload.len());
    buf.extend_from_slice(&[frame_type.to_byte()]);
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&payload);
    buf.freeze()
}

/// Parses a frame off the wire. Frames shorter than 5 bytes are rejected.
pub fn decode(bytes: Bytes) -> Result<Frame, FramerError> {
    if bytes.len() < 5 {
        return Err(FramerError::TooShort(bytes.len()));
    }
    let frame_type = FrameType::from_byte(bytes[0]).ok_or(FramerError::UnknownType(bytes[0]))?;
    let seq = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    let payload = bytes.slice(5..);
    Ok(Frame {
        frame_type,
        seq,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_counter_wraps_modulo_2_32() {
        let mut counter = SequenceCounter(u32::MAX);
        assert_eq!(counter.next(), u32::MAX);
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn audio_frame_round_trips() {
        let payload = Bytes::from_static(b"hello codec bytes");
        let wire = encode_audio(42, payload.clone());
        let frame = decode(wire).unwrap();
        assert_eq!(frame.frame_type, FrameType::Audio);
        assert_eq!(frame.seq, 42);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn ping_has_empty_payload_pong_echoes_it() {
        let ping = encode_ping(1);
        let decoded_ping = decode(ping).unwrap();
        assert_eq!(decoded_ping.frame_type, FrameType::Ping);
        assert!(decoded_ping.payload.is_empty());

        let ts: u64 = 123_456_789;
        let pong = encode_pong(2, Bytes::copy_from_slice(&ts.to_be_bytes()));
        let decoded_pong = decode(pong).unwrap();
        assert_eq!(decoded_pong.frame_type, FrameType::Pong);
        assert_eq!(decoded_pong.payload.len(), 8);
        let echoed = u64::from_be_bytes(decoded_pong.payload[..8].try_into().unwrap());
        assert_eq!(echoed, ts);
    }

    #[test]
    fn rejects_frames_shorter_than_five_bytes() {
        let err = decode(Bytes::from_static(&[0x01, 0, 0, 0])).unwrap_err();
        assert_eq!(err, FramerError::TooShort(4));
    }

    #[test]
    fn rejects_unknown_type_byte() {
        let err = decode(Bytes::from_static(&[0xFF, 0, 0, 0, 0])).unwrap_err();
        assert_eq!(err, FramerError::UnknownType(0xFF));
    }
}
