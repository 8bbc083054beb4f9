//! Binary frame encoding and decoding.
//!
//! Every gateway message is a frame with a fixed 16-byte header followed by
//! an opaque payload:
//!
//! ```text
//! +--------------+--------------+-----------+--------------+--------------+---------+
//! | total (4 BE) | header (2 BE)| ver (2 BE)| op (4 BE)    | seq (4 BE)   | payload |
//! +--------------+--------------+-----------+--------------+--------------+---------+
//! ```
//!
//! `total` covers the header and the payload. The payload interpretation
//! depends on the operation and, for MESSAGE frames, on the version field.

use crate::cursor::ByteReader;
use crate::error::{ProtocolError, ProtocolResult};
use crate::{HEADER_LEN, MAX_FRAME_SIZE};

/// Frame operation codes.
///
/// Unassigned codes are preserved as [`Operation::Unknown`] so callers can
/// ignore them without the decoder failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Client keepalive.
    Heartbeat,
    /// Server keepalive reply, carries the online count.
    HeartbeatReply,
    /// Server business event batch.
    Message,
    /// Client authentication request.
    Auth,
    /// Server authentication acknowledgement.
    AuthReply,
    /// Any operation code this decoder does not assign.
    Unknown(u32),
}

impl Operation {
    /// Maps a wire code to an operation.
    pub fn from_wire(code: u32) -> Self {
        match code {
            2 => Self::Heartbeat,
            3 => Self::HeartbeatReply,
            5 => Self::Message,
            7 => Self::Auth,
            8 => Self::AuthReply,
            other => Self::Unknown(other),
        }
    }

    /// The wire code for this operation.
    pub fn to_wire(self) -> u32 {
        match self {
            Self::Heartbeat => 2,
            Self::HeartbeatReply => 3,
            Self::Message => 5,
            Self::Auth => 7,
            Self::AuthReply => 8,
            Self::Unknown(other) => other,
        }
    }
}

/// Payload version codes.
///
/// For MESSAGE frames this selects the payload decoding: plain JSON or a
/// compressed envelope of concatenated sub-frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// Payload is a single JSON document.
    Json,
    /// Payload is a raw big-endian integer (and the version client frames carry).
    HeartbeatReply,
    /// Payload is a deflate envelope of concatenated sub-frames.
    Deflate,
    /// Payload is a brotli envelope of concatenated sub-frames.
    Brotli,
    /// Any version code this decoder does not assign.
    Unknown(u16),
}

impl ProtocolVersion {
    /// Maps a wire code to a version.
    pub fn from_wire(code: u16) -> Self {
        match code {
            0 => Self::Json,
            1 => Self::HeartbeatReply,
            2 => Self::Deflate,
            3 => Self::Brotli,
            other => Self::Unknown(other),
        }
    }

    /// The wire code for this version.
    pub fn to_wire(self) -> u16 {
        match self {
            Self::Json => 0,
            Self::HeartbeatReply => 1,
            Self::Deflate => 2,
            Self::Brotli => 3,
            Self::Unknown(other) => other,
        }
    }
}

/// A decoded gateway frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Payload version.
    pub version: ProtocolVersion,
    /// Frame operation.
    pub operation: Operation,
    /// Sequence number. Client frames send a constant 1.
    pub sequence: u32,
    /// Raw payload bytes, not yet interpreted.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame with sequence 1.
    pub fn new(operation: Operation, version: ProtocolVersion, payload: Vec<u8>) -> Self {
        Self {
            version,
            operation,
            sequence: 1,
            payload,
        }
    }

    /// Sets the sequence number.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// The encoded size of this frame.
    pub fn total_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

/// Encodes a frame to wire bytes.
///
/// # Example
///
/// ```rust
/// use livefeed_protocol::{Frame, Operation, ProtocolVersion, decode_frame, encode_frame};
///
/// let frame = Frame::new(
///     Operation::Heartbeat,
///     ProtocolVersion::HeartbeatReply,
///     b"[object Object]".to_vec(),
/// );
/// let bytes = encode_frame(&frame).unwrap();
/// let (decoded, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(consumed, bytes.len());
/// assert_eq!(decoded, frame);
/// ```
pub fn encode_frame(frame: &Frame) -> ProtocolResult<Vec<u8>> {
    let total_len = frame.total_len();
    if total_len > MAX_FRAME_SIZE as usize {
        return Err(ProtocolError::FrameTooLarge {
            size: total_len as u32,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(total_len);
    buffer.extend_from_slice(&(total_len as u32).to_be_bytes());
    buffer.extend_from_slice(&(HEADER_LEN as u16).to_be_bytes());
    buffer.extend_from_slice(&frame.version.to_wire().to_be_bytes());
    buffer.extend_from_slice(&frame.operation.to_wire().to_be_bytes());
    buffer.extend_from_slice(&frame.sequence.to_be_bytes());
    buffer.extend_from_slice(&frame.payload);
    Ok(buffer)
}

/// Decodes the first frame in a buffer.
///
/// Returns the frame and the number of bytes consumed. A websocket message
/// may carry several frames back to back; callers slice off the consumed
/// prefix and decode again until the buffer is empty.
pub fn decode_frame(data: &[u8]) -> ProtocolResult<(Frame, usize)> {
    let mut reader = ByteReader::new(data);

    let total_len = reader.read_u32()? as usize;
    let header_len = reader.read_u16()?;
    let version = ProtocolVersion::from_wire(reader.read_u16()?);
    let operation = Operation::from_wire(reader.read_u32()?);
    let sequence = reader.read_u32()?;

    if total_len > MAX_FRAME_SIZE as usize {
        return Err(ProtocolError::FrameTooLarge {
            size: total_len as u32,
            max: MAX_FRAME_SIZE,
        });
    }
    if header_len as usize != HEADER_LEN {
        return Err(ProtocolError::InvalidHeaderLength(header_len));
    }
    if total_len < HEADER_LEN {
        return Err(ProtocolError::InvalidTotalLength(total_len as u32));
    }

    let payload = reader.read_bytes(total_len - HEADER_LEN)?.to_vec();

    Ok((
        Frame {
            version,
            operation,
            sequence,
            payload,
        },
        total_len,
    ))
}
