//! Merging pages from many sources into one document.
//!
//! - [`merger`]: the [`MergeEngine`] that reads sources from scratch storage,
//!   assembles the output and guarantees cleanup.
//! - [`pages`]: page-level copying into the output document.

pub mod merger;
pub mod pages;

pub use merger::{MergeEngine, MergeStatistics, MergedDocument};
pub use pages::PageAssembler;
