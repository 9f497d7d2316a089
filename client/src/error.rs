use std::{error::Error, fmt, io, path::PathBuf};

use comms::specs::federated::ConfigErr;
use machine_learning::MlErr;

/// The client module's result type.
pub type Result<T> = std::result::Result<T, ClientErr>;

/// Client runtime failures.
#[derive(Debug)]
pub enum ClientErr {
    Io(io::Error),
    DataNotFound {
        path: PathBuf,
    },
    MalformedPartition {
        path: PathBuf,
        reason: String,
    },
    UnknownTask(String),
    Config(ConfigErr),
    Ml(MlErr),
    UnexpectedMessage {
        got: &'static str,
    },
}

impl ClientErr {
    /// Whether the error only concerns the request that caused it, in which case a serving
    /// client reports it and keeps going.
    pub fn is_request_local(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::UnexpectedMessage { .. })
    }
}

impl fmt::Display for ClientErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErr::Io(e) => write!(f, "io error: {e}"),
            ClientErr::DataNotFound { path } => {
                write!(f, "data not found: no readable partition at {}", path.display())
            }
            ClientErr::MalformedPartition { path, reason } => {
                write!(f, "malformed partition {}: {reason}", path.display())
            }
            ClientErr::UnknownTask(task) => write!(f, "unknown task `{task}`"),
            ClientErr::Config(e) => write!(f, "invalid configuration: {e}"),
            ClientErr::Ml(e) => write!(f, "model error: {e}"),
            ClientErr::UnexpectedMessage { got } => write!(f, "unexpected message: got {got}"),
        }
    }
}

impl Error for ClientErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientErr::Io(e) => Some(e),
            ClientErr::Config(e) => Some(e),
            ClientErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ConfigErr> for ClientErr {
    fn from(value: ConfigErr) -> Self {
        Self::Config(value)
    }
}

impl From<MlErr> for ClientErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<ClientErr> for io::Error {
    fn from(value: ClientErr) -> Self {
        match value {
            ClientErr::Io(e) => e,
            ClientErr::DataNotFound { .. } => io::Error::new(io::ErrorKind::NotFound, value),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
