//! Gateway packet semantics on top of raw frames.
//!
//! This module knows what each operation's payload means: the AUTH handshake
//! body, the online count inside heartbeat replies, and the business event
//! batches inside MESSAGE frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cursor::ByteReader;
use crate::decompress::{decompress_brotli, decompress_deflate, split_sub_frames};
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::{Frame, Operation, ProtocolVersion, encode_frame};

// Client-sent frames carry wire version 1, matching the stock web client.
const CLIENT_VERSION: ProtocolVersion = ProtocolVersion::HeartbeatReply;

/// The heartbeat body the stock web client sends. The gateway accepts any
/// body and never echoes it back.
const HEARTBEAT_BODY: &[u8] = b"[object Object]";

/// The authentication body sent right after the socket opens.
///
/// Field names are the gateway's own; `key` is the token obtained during
/// HTTP negotiation and is only valid for the room it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Viewer uid, 0 for anonymous sessions.
    pub uid: u64,
    /// The room to subscribe to.
    pub roomid: u64,
    /// Highest envelope version the client accepts.
    pub protover: u16,
    /// Client platform tag.
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: u32,
    /// Negotiated gateway token.
    pub key: String,
}

impl AuthPayload {
    /// Creates an auth body for one room.
    pub fn new(
        uid: u64,
        roomid: u64,
        protover: u16,
        platform: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            uid,
            roomid,
            protover,
            platform: platform.into(),
            kind: 2,
            key: key.into(),
        }
    }
}

/// A decoded, server-sent gateway packet.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// The gateway accepted our AUTH frame; the stream is live.
    AuthAccepted,
    /// Online count from a heartbeat reply.
    OnlineCount(u32),
    /// Business event documents from a MESSAGE frame, in arrival order.
    Events(Vec<Value>),
}

/// Encodes an AUTH frame ready for the wire.
pub fn auth_frame(payload: &AuthPayload) -> ProtocolResult<Vec<u8>> {
    let body = serde_json::to_vec(payload)?;
    encode_frame(&Frame::new(Operation::Auth, CLIENT_VERSION, body))
}

/// Encodes a HEARTBEAT frame ready for the wire.
///
/// The bytes are identical every time, so callers encode once and resend the
/// same buffer on each beat.
pub fn heartbeat_frame() -> ProtocolResult<Vec<u8>> {
    encode_frame(&Frame::new(
        Operation::Heartbeat,
        CLIENT_VERSION,
        HEARTBEAT_BODY.to_vec(),
    ))
}

/// Interprets a server frame.
///
/// Returns `Ok(None)` for operations addressed to the server or unknown to
/// this decoder; callers ignore those. Errors mean this frame's payload was
/// unusable; the frame is skipped and neighbours are unaffected.
pub fn decode_gateway_event(frame: &Frame) -> ProtocolResult<Option<GatewayEvent>> {
    match frame.operation {
        Operation::AuthReply => Ok(Some(GatewayEvent::AuthAccepted)),
        Operation::HeartbeatReply => {
            let mut reader = ByteReader::new(&frame.payload);
            let count = reader.read_u32()?;
            Ok(Some(GatewayEvent::OnlineCount(count)))
        }
        Operation::Message => decode_message_payload(frame).map(Some),
        Operation::Heartbeat | Operation::Auth | Operation::Unknown(_) => Ok(None),
    }
}

fn decode_message_payload(frame: &Frame) -> ProtocolResult<GatewayEvent> {
    match frame.version {
        ProtocolVersion::Json => {
            let document: Value = serde_json::from_slice(&frame.payload)?;
            Ok(GatewayEvent::Events(vec![document]))
        }
        ProtocolVersion::Deflate => {
            let inflated = decompress_deflate(&frame.payload)?;
            Ok(GatewayEvent::Events(split_sub_frames(&inflated)))
        }
        ProtocolVersion::Brotli => {
            let inflated = decompress_brotli(&frame.payload)?;
            Ok(GatewayEvent::Events(split_sub_frames(&inflated)))
        }
        other => Err(ProtocolError::UnsupportedVersion(other.to_wire())),
    }
}
