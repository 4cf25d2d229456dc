//! Result and Error types for wxtools-field

/// Type alias for Result<T, field::Error>
pub type Result<T> = core::result::Result<T, Error>;

/// The error type for the `wxtools-field` crate
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed input/output stream")]
    IOError(#[from] std::io::Error),

    #[error("malformed grid document")]
    JsonError(#[from] serde_json::Error),

    #[error("axis \"{0}\" is not strictly monotonic")]
    AxisNotMonotonic(String),

    #[error("axis \"{0}\" needs at least two values")]
    AxisTooShort(String),

    #[error("variable \"{0}\" not found")]
    UnknownVariable(String),

    #[error("inconsistent rank (expected {expected:?}, found {found:?})")]
    RankMismatch { expected: usize, found: usize },

    #[error("inconsistent data length for \"{name}\" (expected {expected:?}, found {found:?})")]
    UnexpectedDataLength {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
