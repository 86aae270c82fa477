//! Error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top level error for loading, fitting, and persisting a model
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("dump error: {0}")]
    Dump(#[from] DumpError),
    #[error("numerical failure: {0}")]
    Numerical(#[from] NumericalError),
    /// The model was constructed or fed with inconsistent parameters
    #[error("invalid model: {0}")]
    InvalidModel(String),
    /// An EM operation was requested before any data were loaded
    #[error("no data loaded")]
    NotLoaded,
    #[error("configuration error: {0}")]
    Config(String),
}

/// Structural problems with a binary dump
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DumpError {
    #[error("dimension mismatch: assuming {expected} but dump is {found}-D")]
    DimensionMismatch { expected: usize, found: usize },
    #[error(
        "number type mismatch: assuming {expected} bytes/value, but {found}"
    )]
    ValueSizeMismatch { expected: usize, found: usize },
    #[error(
        "number of groups mismatch: header declares {expected}, dump holds {found}"
    )]
    GroupCountMismatch { expected: usize, found: usize },
    #[error("group identifier is not valid UTF-8")]
    InvalidIdentifier,
    #[error("size field {0} does not fit in memory")]
    LengthOverflow(u64),
}

/// Divergence of the EM iteration. These are never recovered from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalError {
    #[error("updated parameter [{component}][{dim}] = {value} is not finite")]
    NonFiniteParameter {
        component: usize,
        dim: usize,
        value: f64,
    },
    #[error("updated rate [{component}][{dim}] = {value} is not finite")]
    NonFiniteRate {
        component: usize,
        dim: usize,
        value: f64,
    },
    #[error("log-likelihood term of group `{group}` is {value}")]
    NonFiniteLikelihood { group: String, value: f64 },
}
