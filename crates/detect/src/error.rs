//! Result and Error types for wxtools-detect

/// Type alias for Result<T, detect::Error>
pub type Result<T> = core::result::Result<T, Error>;

/// The error type for the `wxtools-detect` crate
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("field error")]
    FieldError(#[from] wxtools_field::Error),

    #[error("cluster error")]
    ClusterError(#[from] wxtools_cluster::Error),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("numeric instability in {0}")]
    NumericInstability(String),

    #[error("pipeline cancelled")]
    Cancelled,
}
