//! Small extensions of `std` types shared across the toolkit
//!
//! Kept public for convenience: consistent scientific number formatting and
//! the bits of vector arithmetic (norms, extrema) every pipeline stage
//! needs.

// Alias for the format! macro
pub use std::format as f;

// Modules
mod option_ext;
mod slice_ext;
mod value_ext;

// Flatten
pub use option_ext::OptionExt;
pub use slice_ext::SliceExt;
pub use value_ext::ValueExt;
