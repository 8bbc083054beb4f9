//! Binary framing and packet decoding for the live gateway.
//!
//! The gateway speaks length-prefixed binary frames over a websocket:
//! - 16 bytes: header (total length, header length, version, operation, sequence)
//! - N bytes: payload
//!
//! All integers are big-endian. MESSAGE payloads may be a single JSON
//! document or a deflate/brotli envelope of concatenated sub-frames; this
//! crate decodes both and exposes the result as [`GatewayEvent`] values.
//!
//! # Example
//!
//! ```rust
//! use livefeed_protocol::{decode_frame, decode_gateway_event, heartbeat_frame};
//!
//! let bytes = heartbeat_frame().unwrap();
//! let (frame, consumed) = decode_frame(&bytes).unwrap();
//! assert_eq!(consumed, bytes.len());
//! // Client-sent operations decode to None and are ignored on receive.
//! assert!(decode_gateway_event(&frame).unwrap().is_none());
//! ```

mod cursor;
mod decompress;
mod error;
mod frame;
mod packet;

pub use cursor::ByteReader;
pub use decompress::{decompress_brotli, decompress_deflate, split_sub_frames};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{Frame, Operation, ProtocolVersion, decode_frame, encode_frame};
pub use packet::{AuthPayload, GatewayEvent, auth_frame, decode_gateway_event, heartbeat_frame};

/// Fixed frame header size in bytes.
pub const HEADER_LEN: usize = 16;

/// Maximum frame size (16 MB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;
