use std::path::PathBuf;
use thiserror::Error;

/// Core error type for minivite operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A package manifest or entry point could not be resolved.
    #[error("{0}")]
    Resolution(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed WebSocket upgrade request.
    #[error("WebSocket handshake rejected: {0}")]
    Protocol(String),

    #[error("Write to closed connection {0}")]
    TransportWrite(u64),

    #[error("Cannot watch {path}: {message}")]
    Watch { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    #[must_use]
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// HTTP status for surfacing this error to a requesting client.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => 404,
            Self::Protocol(_) => 400,
            _ => 500,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
