//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding gateway traffic.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Buffer ended before the structure being read was complete.
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Frame exceeds the maximum allowed size.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: u32, max: u32 },

    /// The header length field does not match the fixed header layout.
    #[error("invalid header length: {0}")]
    InvalidHeaderLength(u16),

    /// The total length field is smaller than the header itself.
    #[error("invalid total length: {0}")]
    InvalidTotalLength(u32),

    /// A MESSAGE frame carried a payload version the decoder cannot handle.
    #[error("unsupported payload version: {0}")]
    UnsupportedVersion(u16),

    /// Payload bytes are not the JSON the frame version promised.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A compressed envelope failed to decompress.
    #[error("{codec} decompression failed: {source}")]
    Decompress {
        codec: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl ProtocolError {
    /// Creates a deflate decompression error.
    pub fn inflate(source: std::io::Error) -> Self {
        Self::Decompress {
            codec: "deflate",
            source,
        }
    }

    /// Creates a brotli decompression error.
    pub fn brotli(source: std::io::Error) -> Self {
        Self::Decompress {
            codec: "brotli",
            source,
        }
    }
}
