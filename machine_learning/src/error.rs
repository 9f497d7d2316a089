use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    ShapeMismatch {
        position: usize,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    InvalidLabel {
        label: f32,
        classes: usize,
    },
    IndexOutOfRange {
        index: f32,
        len: usize,
    },
    InvalidInit(String),
    Shape(ShapeError),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::ShapeMismatch {
                position,
                got,
                expected,
            } => write!(
                f,
                "The tensor at position {position} has shape {got:?}, expected {expected:?}"
            ),
            MlErr::InvalidLabel { label, classes } => {
                write!(f, "The label {label} is not a class index below {classes}")
            }
            MlErr::IndexOutOfRange { index, len } => {
                write!(f, "The index {index} is out of range for a table of {len} rows")
            }
            MlErr::InvalidInit(detail) => write!(f, "Invalid parameter initializer: {detail}"),
            MlErr::Shape(e) => write!(f, "Invalid array shape: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}
