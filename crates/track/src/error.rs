//! Result and Error types for wxtools-track

/// Type alias for Result<T, track::Error>
pub type Result<T> = core::result::Result<T, Error>;

/// The error type for the `wxtools-track` crate
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("numeric instability in {0}")]
    NumericInstability(String),
}
