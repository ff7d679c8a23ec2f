use ndarray::ShapeError;
use ndarray_linalg::error::LinalgError;
use ndarray_npy::{ReadNpyError, WriteNpyError};
use std::error;
use std::fmt;
use std::io;

/// Errors raised by the chain containers and the dense tensor algebra.
#[derive(Debug)]
pub enum ChainError {
    /// An array could not be reshaped or converted to the requested dimensionality.
    Shape(ShapeError),
    /// The axes of a pairwise contraction do not match.
    Contraction(String),
    /// A LAPACK routine failed.
    Linalg(LinalgError),
    /// A paged tensor could not be read back from disk.
    ReadNpy(ReadNpyError),
    /// A tensor could not be paged out to disk.
    WriteNpy(WriteNpyError),
    Io(io::Error),
    /// The chain has a vanishing norm and cannot be normalized.
    ZeroNorm,
    /// The chain or operator was constructed from inconsistent tensors.
    Invalid(String),
}

impl ChainError {
    /// True for failures of the external storage used by disk paging.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            ChainError::ReadNpy(_) | ChainError::WriteNpy(_) | ChainError::Io(_)
        )
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Shape(err) => write!(f, "shape error: {}", err),
            ChainError::Contraction(msg) => write!(f, "contraction error: {}", msg),
            ChainError::Linalg(err) => write!(f, "linear algebra error: {}", err),
            ChainError::ReadNpy(err) => write!(f, "could not read paged tensor: {}", err),
            ChainError::WriteNpy(err) => write!(f, "could not write paged tensor: {}", err),
            ChainError::Io(err) => write!(f, "i/o error: {}", err),
            ChainError::ZeroNorm => write!(f, "the chain has zero norm"),
            ChainError::Invalid(msg) => write!(f, "invalid chain: {}", msg),
        }
    }
}

impl error::Error for ChainError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ChainError::Shape(err) => Some(err),
            ChainError::Linalg(err) => Some(err),
            ChainError::ReadNpy(err) => Some(err),
            ChainError::WriteNpy(err) => Some(err),
            ChainError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShapeError> for ChainError {
    fn from(err: ShapeError) -> Self {
        ChainError::Shape(err)
    }
}

impl From<LinalgError> for ChainError {
    fn from(err: LinalgError) -> Self {
        ChainError::Linalg(err)
    }
}

impl From<ReadNpyError> for ChainError {
    fn from(err: ReadNpyError) -> Self {
        ChainError::ReadNpy(err)
    }
}

impl From<WriteNpyError> for ChainError {
    fn from(err: WriteNpyError) -> Self {
        ChainError::WriteNpy(err)
    }
}

impl From<io::Error> for ChainError {
    fn from(err: io::Error) -> Self {
        ChainError::Io(err)
    }
}
