//! Result and Error types for wxtools-cluster

/// Type alias for Result<T, cluster::Error>
pub type Result<T> = core::result::Result<T, Error>;

/// The error type for the `wxtools-cluster` crate
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed input/output stream")]
    IOError(#[from] std::io::Error),

    #[error("malformed cluster document")]
    JsonError(#[from] serde_json::Error),

    #[error("field error")]
    FieldError(#[from] wxtools_field::Error),

    #[error("cluster file version {found} is not supported (expected {expected})")]
    UnsupportedVersion { expected: u32, found: u32 },
}
