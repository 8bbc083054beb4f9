//! Client error types.

use std::fmt;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Avatar provider error.
    Provider(String),
    /// Room ingestion error.
    Ingest(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Provider(msg) => write!(f, "provider error: {}", msg),
            Self::Ingest(msg) => write!(f, "ingestion error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<livefeed_ingest::IngestError> for ClientError {
    fn from(err: livefeed_ingest::IngestError) -> Self {
        Self::Ingest(err.to_string())
    }
}

impl From<livefeed_providers::ProviderError> for ClientError {
    fn from(err: livefeed_providers::ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}
