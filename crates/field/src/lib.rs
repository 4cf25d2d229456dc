//! Gridded data stores, coordinate systems, and feature spaces
#![doc = include_str!("../readme.md")]

// Split into subfiles for development, but anything important is re-exported
mod coordinate;
mod error;
mod featurespace;
mod filter;
mod point;
mod store;

#[doc(inline)]
pub use coordinate::CoordinateSystem;

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use featurespace::{FeatureSpace, Thresholds};

#[doc(inline)]
pub use filter::ScaleSpaceFilter;

#[doc(inline)]
pub use point::Point;

#[doc(inline)]
pub use store::{read_grid_file, ArrayStore, DataStore, Variable};
