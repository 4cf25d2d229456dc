//! Cross-frame cluster identity tracking
#![doc = include_str!("../readme.md")]

mod error;
mod tracker;

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use tracker::{Tracking, TrackingParams};
