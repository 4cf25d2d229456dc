//! A modular toolkit of fast and reliable libraries for meteorological
//! feature detection and tracking
//!
#![doc = include_str!("../readme.md")]
#![deny(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

// Flatten the default crates
#[doc(inline)]
pub use wxtools_utils as utils;

// Re-exports of crates that are behind feature flags
#[cfg(feature = "field")]
#[cfg_attr(docsrs, doc(cfg(feature = "field")))]
#[doc(inline)]
pub use wxtools_field as field;

#[cfg(feature = "index")]
#[cfg_attr(docsrs, doc(cfg(feature = "index")))]
#[doc(inline)]
pub use wxtools_index as index;

#[cfg(feature = "cluster")]
#[cfg_attr(docsrs, doc(cfg(feature = "cluster")))]
#[doc(inline)]
pub use wxtools_cluster as cluster;

#[cfg(feature = "detect")]
#[cfg_attr(docsrs, doc(cfg(feature = "detect")))]
#[doc(inline)]
pub use wxtools_detect as detect;

#[cfg(feature = "track")]
#[cfg_attr(docsrs, doc(cfg(feature = "track")))]
#[doc(inline)]
pub use wxtools_track as track;
