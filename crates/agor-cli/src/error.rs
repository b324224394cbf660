use std::fmt;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    /// Client/daemon error from the SDK
    Sdk(agor_sdk::Error),

    /// Daemon-side error when running `agor daemon`
    Daemon(agor_daemon::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Invalid command-line value (bad id, unknown tool)
    BadArgument(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Sdk(err) => write!(f, "{}", err),
            CliError::Daemon(err) => write!(f, "{}", err),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::BadArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Sdk(err) => Some(err),
            CliError::Daemon(err) => Some(err),
            CliError::Io(err) => Some(err),
            CliError::BadArgument(_) => None,
        }
    }
}

impl CliError {
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            CliError::Sdk(err) => err.is_unauthenticated(),
            _ => false,
        }
    }
}

impl From<agor_sdk::Error> for CliError {
    fn from(err: agor_sdk::Error) -> Self {
        CliError::Sdk(err)
    }
}

impl From<agor_daemon::Error> for CliError {
    fn from(err: agor_daemon::Error) -> Self {
        CliError::Daemon(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}
