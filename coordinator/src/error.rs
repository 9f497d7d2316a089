use std::{error::Error, fmt, io};

use client::ClientErr;
use comms::specs::federated::ConfigErr;
use machine_learning::MlErr;

/// The coordinator module's result type.
pub type Result<T> = std::result::Result<T, CoordinatorErr>;

/// All errors that can occur while driving federated rounds.
#[derive(Debug)]
pub enum CoordinatorErr {
    /// The round's training configuration is invalid, caught before dispatching.
    Config(ConfigErr),
    /// The experiment or orchestrator setup is invalid.
    InvalidConfig(String),
    /// Failed to connect to a remote client.
    ConnectionFailed { addr: String, source: io::Error },
    /// A returned weight vector doesn't match the layout of the others.
    WeightShapeMismatch { result: usize, source: MlErr },
    /// There was nothing to aggregate.
    Aggregation(&'static str),
    /// Fewer clients answered than the round requires.
    QuorumNotMet {
        respondents: usize,
        required: usize,
        selected: usize,
    },
    /// The round was cancelled before aggregating.
    Cancelled,
    /// An in-process client failed its request.
    Client(ClientErr),
    /// A remote client answered a request with an error frame.
    ClientFailed { client_id: String, reason: String },
    /// A remote client broke the protocol.
    UnexpectedMessage {
        client_id: String,
        got: &'static str,
    },
    Ml(MlErr),
    Io(io::Error),
}

impl CoordinatorErr {
    /// Whether running another round may succeed where this one failed.
    pub fn is_retry_eligible(&self) -> bool {
        matches!(self, Self::QuorumNotMet { .. })
    }
}

impl fmt::Display for CoordinatorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid training config: {e}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::ConnectionFailed { addr, source } => {
                write!(f, "connection failed to {addr}: {source}")
            }
            Self::WeightShapeMismatch { result, source } => {
                write!(f, "weight shape mismatch in result {result}: {source}")
            }
            Self::Aggregation(reason) => write!(f, "aggregation failed: {reason}"),
            Self::QuorumNotMet {
                respondents,
                required,
                selected,
            } => write!(
                f,
                "quorum not met: {respondents} of {selected} clients answered, {required} required"
            ),
            Self::Cancelled => write!(f, "round cancelled"),
            Self::Client(e) => write!(f, "client error: {e}"),
            Self::ClientFailed { client_id, reason } => {
                write!(f, "client {client_id} failed: {reason}")
            }
            Self::UnexpectedMessage { client_id, got } => {
                write!(f, "unexpected message from client {client_id}: got {got}")
            }
            Self::Ml(e) => write!(f, "model error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for CoordinatorErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::ConnectionFailed { source, .. } => Some(source),
            Self::WeightShapeMismatch { source, .. } => Some(source),
            Self::Client(e) => Some(e),
            Self::Ml(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CoordinatorErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ConfigErr> for CoordinatorErr {
    fn from(value: ConfigErr) -> Self {
        Self::Config(value)
    }
}

impl From<ClientErr> for CoordinatorErr {
    fn from(value: ClientErr) -> Self {
        Self::Client(value)
    }
}

impl From<MlErr> for CoordinatorErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<CoordinatorErr> for io::Error {
    fn from(value: CoordinatorErr) -> Self {
        match value {
            CoordinatorErr::Io(e) => e,
            CoordinatorErr::ConnectionFailed { .. } => {
                io::Error::new(io::ErrorKind::ConnectionRefused, value)
            }
            CoordinatorErr::Config(_) | CoordinatorErr::InvalidConfig(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, value)
            }
            other => io::Error::other(other),
        }
    }
}
