//! pagemerge - Reorder, rotate and merge pages from many PDF files.
//!
//! Users upload several documents, rearrange their pages freely across
//! files, rotate individual pages and download one merged PDF. This library
//! provides every piece of that workflow:
//!
//! - Upload ingestion with per-file rejection of unreadable documents
//! - An ordered, duplicate-free page sequence with rotation
//! - A two-tier cache of rendered page images
//! - Page-level merging that preserves inherited page attributes
//! - Scratch storage with guaranteed cleanup after a merge
//! - An HTTP service exposing all of the above
//!
//! # Examples
//!
//! ## Editing Session
//!
//! ```no_run
//! use pagemerge::cache::{CacheOptions, PageCache};
//! use pagemerge::ingest::RawFile;
//! use pagemerge::render::PdfiumRasterizer;
//! use pagemerge::session::EditSession;
//! use pagemerge::storage::ScratchStorage;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = ScratchStorage::open("/tmp/pagemerge").await?;
//! let cache = PageCache::new(
//!     storage.clone(),
//!     Arc::new(PdfiumRasterizer::new()),
//!     CacheOptions::default(),
//! );
//! let mut session = EditSession::new(storage, cache, 4);
//!
//! let a = RawFile::new("a.pdf", std::fs::read("a.pdf")?);
//! let b = RawFile::new("b.pdf", std::fs::read("b.pdf")?);
//! session.upload(vec![a, b]).await?;
//!
//! // Move the last page to the front and turn it sideways.
//! let mut ids = session.order().ids();
//! let last = ids.pop().unwrap();
//! ids.insert(0, last.clone());
//! session.reorder(&ids)?;
//! session.rotate(&last, 90)?;
//!
//! let merged = session.merge("combined").await?;
//! std::fs::write(&merged.file_name, &merged.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## HTTP Service
//!
//! ```no_run
//! use pagemerge::Config;
//!
//! # async fn example() -> pagemerge::Result<()> {
//! pagemerge::server::serve(Config::default()).await
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod ingest;
pub mod io;
pub mod merge;
pub mod order;
pub mod render;
pub mod server;
pub mod session;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use document::{FileId, PageDescriptor, PageId, PageRotation};
pub use error::{PageMergeError, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
