use dmrg_chain::ChainError;
use ndarray::ShapeError;
use ndarray_linalg::error::LinalgError;
use std::error;
use std::fmt;

/// Failures of a DMRG run.
#[derive(Debug)]
pub enum DmrgError {
    /// The run was set up with inconsistent or invalid parameters.
    Configuration(String),
    /// A vector or tensor that has to be normalized has zero norm.
    NumericalDegeneracy(String),
    /// Reading or writing paged tensors failed.
    Resource(ChainError),
    /// Failure of the tensor algebra on the chain.
    Chain(ChainError),
    Linalg(LinalgError),
    Shape(ShapeError),
}

impl fmt::Display for DmrgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmrgError::Configuration(msg) => write!(f, "invalid DMRG configuration: {}", msg),
            DmrgError::NumericalDegeneracy(msg) => write!(f, "numerical degeneracy: {}", msg),
            DmrgError::Resource(err) => write!(f, "disk paging failed: {}", err),
            DmrgError::Chain(err) => write!(f, "{}", err),
            DmrgError::Linalg(err) => write!(f, "linear algebra error: {}", err),
            DmrgError::Shape(err) => write!(f, "shape error: {}", err),
        }
    }
}

impl error::Error for DmrgError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DmrgError::Resource(err) | DmrgError::Chain(err) => Some(err),
            DmrgError::Linalg(err) => Some(err),
            DmrgError::Shape(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ChainError> for DmrgError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::ZeroNorm => {
                DmrgError::NumericalDegeneracy(String::from("the state has zero norm"))
            }
            err if err.is_resource() => DmrgError::Resource(err),
            err => DmrgError::Chain(err),
        }
    }
}

impl From<LinalgError> for DmrgError {
    fn from(err: LinalgError) -> Self {
        DmrgError::Linalg(err)
    }
}

impl From<ShapeError> for DmrgError {
    fn from(err: ShapeError) -> Self {
        DmrgError::Shape(err)
    }
}
