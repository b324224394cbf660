use agor_types::ErrorKind;
use std::fmt;

/// Result type for agor-daemon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the daemon layer.
///
/// The variants mirror the wire taxonomy: handlers convert them 1:1 into
/// `ErrorBody` frames so clients can branch on kind.
#[derive(Debug)]
pub enum Error {
    /// Entity lookup miss
    NotFound(String),

    /// Write rejected: would violate an invariant
    Conflict(String),

    /// Missing or invalid session token
    Unauthenticated(String),

    /// Request payload failed schema validation
    Validation(String),

    /// Store layer error
    Store(agor_store::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Payload (de)serialization failed
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(what) => write!(f, "Not found: {}", what),
            Error::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Error::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            Error::Validation(msg) => write!(f, "Validation error: {}", msg),
            Error::Store(err) => write!(f, "Store error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Store(agor_store::Error::NotFound(_)) => ErrorKind::NotFound,
            Error::Store(agor_store::Error::Conflict(_)) => ErrorKind::Conflict,
            Error::Store(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }
}

impl From<agor_store::Error> for Error {
    fn from(err: agor_store::Error) -> Self {
        match err {
            agor_store::Error::NotFound(what) => Error::NotFound(what),
            agor_store::Error::Conflict(msg) => Error::Conflict(msg),
            other => Error::Store(other),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
