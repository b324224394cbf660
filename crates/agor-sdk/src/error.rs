use agor_types::ErrorKind;
use std::fmt;

/// Result type for agor-sdk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the client layer
#[derive(Debug)]
pub enum Error {
    /// Daemon rejected the request; carries the wire taxonomy kind
    Remote { kind: ErrorKind, message: String },

    /// Connection-level failure (dial, read, write)
    Connection(std::io::Error),

    /// Payload (de)serialization failed
    Decode(serde_json::Error),

    /// The connection closed while a request was in flight
    Disconnected,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Remote { kind, message } => write!(f, "Daemon error ({kind:?}): {message}"),
            Error::Connection(err) => write!(f, "Connection error: {}", err),
            Error::Decode(err) => write!(f, "Decode error: {}", err),
            Error::Disconnected => write!(f, "Connection closed mid-request"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(err) => Some(err),
            Error::Decode(err) => Some(err),
            Error::Remote { .. } | Error::Disconnected => None,
        }
    }
}

impl Error {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.kind() == Some(ErrorKind::Unauthenticated)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Connection(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err)
    }
}
