//! Mean-shift feature detection over gridded fields
#![doc = include_str!("../readme.md")]

// Split into subfiles for development, but anything important is re-exported
mod detection;
mod error;
mod kernel;
mod meanshift;
mod weights;

#[doc(inline)]
pub use detection::{
    BoundaryAnalysisParams, CancelToken, Detection, DetectionOutput, DetectionParams, WeightSpec,
};

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use kernel::Kernel;

#[doc(inline)]
pub use meanshift::{apply_meanshift, MeanshiftOperation};

#[doc(inline)]
pub use weights::{WeightFunction, WeightGrid};
