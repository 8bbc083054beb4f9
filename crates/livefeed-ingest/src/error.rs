//! Ingestion error types.

use std::io;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur while ingesting a room feed.
#[derive(Debug, Error)]
pub enum IngestError {
    /// IO error (socket, file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (framing, decompression, etc.).
    #[error("Protocol error: {0}")]
    Protocol(#[from] livefeed_protocol::ProtocolError),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP error during gateway negotiation.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The negotiation endpoint answered but refused us a ticket.
    #[error("Negotiation failed: {message}")]
    Negotiation { message: String },

    /// Database error from the avatar store.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Cache configuration is invalid.
    #[error("Cache configuration error: {message}")]
    CacheConfig { message: String },
}

impl IngestError {
    /// Creates a negotiation error.
    pub fn negotiation(message: impl Into<String>) -> Self {
        Self::Negotiation {
            message: message.into(),
        }
    }

    /// Creates a cache configuration error.
    pub fn cache_config(message: impl Into<String>) -> Self {
        Self::CacheConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_display() {
        let err = IngestError::negotiation("api answered code -400");
        assert_eq!(err.to_string(), "Negotiation failed: api answered code -400");
    }

    #[test]
    fn io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let err: IngestError = io_err.into();
        assert!(matches!(err, IngestError::Io(_)));
    }
}
