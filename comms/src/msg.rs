use std::{borrow::Cow, io};

use crate::{
    Deserialize, Serialize,
    specs::federated::{EvalConfig, EvalResult, TrainingConfig},
};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

const ERR_KIND: Header = 0;
const CONTROL_KIND: Header = 1;
const WEIGHTS_KIND: Header = 2;

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug)]
pub enum Payload<'a> {
    /// The flattened tensors of a weight vector, in order.
    Weights(&'a [f32]),
}

/// The command for the `Control` variant of the `Msg` enum.
///
/// Commands carrying `shapes` are always followed by a `Data(Weights)` frame holding the
/// flattened tensors of those shapes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Fit {
        config: TrainingConfig,
        shapes: Vec<Vec<usize>>,
    },
    FitDone {
        num_examples: usize,
        duration: f64,
        shapes: Vec<Vec<usize>>,
        /// The mean training loss of every local epoch, in order.
        #[serde(default)]
        epoch_losses: Vec<f32>,
    },
    Evaluate {
        config: EvalConfig,
        shapes: Vec<Vec<usize>>,
    },
    EvaluateDone(EvalResult),
    Disconnect,
}

/// The application layer message for the entire system.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// Returns a short name for the kind of message, used in logs and protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::Fit { .. }) => "control/fit",
            Msg::Control(Command::FitDone { .. }) => "control/fit_done",
            Msg::Control(Command::Evaluate { .. }) => "control/evaluate",
            Msg::Control(Command::EvaluateDone(_)) => "control/evaluate_done",
            Msg::Control(Command::Disconnect) => "control/disconnect",
            Msg::Data(Payload::Weights(_)) => "data/weights",
            Msg::Err(_) => "err",
        }
    }

    fn buf_is_too_small<T>(size: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {HEADER_SIZE} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR_KIND.to_be_bytes());
                Ok(Some(e.as_bytes()))
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL_KIND.to_be_bytes());
                serde_json::to_writer(buf, cmd)?;
                Ok(None)
            }
            Msg::Data(Payload::Weights(weights)) => {
                buf.extend_from_slice(&WEIGHTS_KIND.to_be_bytes());
                Ok(Some(bytemuck::cast_slice(weights)))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len());
        }

        let (kind_buf, rest) = buf.split_at(HEADER_SIZE);
        let mut header = [0; HEADER_SIZE];
        header.copy_from_slice(kind_buf);

        match Header::from_be_bytes(header) {
            ERR_KIND => {
                let string = std::str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(string)))
            }
            CONTROL_KIND => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            WEIGHTS_KIND => {
                let nums = bytemuck::try_cast_slice(rest).map_err(|err| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("weights payload is not a valid f32 slice: {err}"),
                    )
                })?;

                Ok(Self::Data(Payload::Weights(nums)))
            }
            kind => Self::invalid_kind(kind),
        }
    }
}
