//! Spatial indexing of feature-space points
#![doc = include_str!("../readme.md")]

mod kdtree;
mod search;
mod whitening;

#[doc(inline)]
pub use kdtree::{Entry, KdTree};

#[doc(inline)]
pub use search::{FeatureSpaceIndex, Neighbour, SearchParams};

#[doc(inline)]
pub use whitening::{WhiteningIndex, WHITE_RADIUS};
