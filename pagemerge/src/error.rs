//! Error types for pagemerge.
//!
//! This module defines every error that can occur while ingesting uploads,
//! editing the page order, rendering previews and merging pages.
//!
//! # Error Categories
//!
//! - **Per-item errors**: one upload could not be parsed, one page could not
//!   be rasterised. These never abort the surrounding batch.
//! - **Order errors**: a reorder or rotate command does not fit the current
//!   page order. The order is left untouched.
//! - **Merge errors**: anything that goes wrong while assembling the output.
//!   The whole merge is aborted but cleanup still runs.
//! - **Storage errors**: scratch files that are missing or outside the
//!   storage root.

use std::io;
use std::path::PathBuf;

/// Result type alias for pagemerge operations.
pub type Result<T> = std::result::Result<T, PageMergeError>;

/// Main error type for pagemerge operations.
#[derive(Debug, thiserror::Error)]
pub enum PageMergeError {
    /// An uploaded file could not be parsed as a PDF.
    #[error("Unreadable PDF: {name}\n  Reason: {reason}")]
    UnreadablePdf {
        /// Original name of the uploaded file.
        name: String,
        /// Reason reported by the parser.
        reason: String,
    },

    /// A reorder command does not contain exactly the current set of pages.
    #[error("Invalid page order: {reason}")]
    InvalidOrder {
        /// What is wrong with the submitted sequence.
        reason: String,
    },

    /// A page with the same id is already part of the order.
    #[error("Page {id} is already part of the page order")]
    DuplicatePage {
        /// Offending page id.
        id: String,
    },

    /// Rotation is not a multiple of 90 degrees.
    #[error("Invalid rotation: {degrees}. Must be a multiple of 90")]
    InvalidRotation {
        /// Requested rotation.
        degrees: i32,
    },

    /// A page id does not follow the `<file>_page_<index>` form.
    #[error("Invalid page id: {id}")]
    InvalidPageId {
        /// The malformed id.
        id: String,
    },

    /// A single page could not be rasterised.
    #[error("Failed to render page {id}: {reason}")]
    RenderFailure {
        /// Page id that failed.
        id: String,
        /// Details reported by the rasteriser.
        reason: String,
    },

    /// The merge was called with no pages.
    #[error("No pages to merge")]
    NoPagesToMerge,

    /// Merge operation failed.
    #[error("Merge operation failed: {reason}")]
    MergeFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// The merged document could not be handed to the caller.
    #[error("Failed to deliver merged document: {reason}")]
    DeliveryFailure {
        /// Description of what went wrong.
        reason: String,
    },

    /// A file id has no known storage location.
    #[error("Unknown file: {file_id}")]
    UnknownFile {
        /// The unknown file id.
        file_id: String,
    },

    /// A storage key resolves outside of the scratch storage root.
    #[error("Invalid storage key: {key}")]
    InvalidStorageKey {
        /// The rejected key.
        key: String,
    },

    /// Failed to write a scratch file.
    #[error("Failed to write file: {}\n  Reason: {source}", .path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl From<lopdf::Error> for PageMergeError {
    fn from(err: lopdf::Error) -> Self {
        Self::other(err.to_string())
    }
}

impl PageMergeError {
    /// Create an UnreadablePdf error.
    pub fn unreadable_pdf(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnreadablePdf {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidOrder error.
    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidOrder {
            reason: reason.into(),
        }
    }

    /// Create a RenderFailure error.
    pub fn render_failure(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RenderFailure {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a MergeFailed error.
    pub fn merge_failed(reason: impl Into<String>) -> Self {
        Self::MergeFailed {
            reason: reason.into(),
        }
    }

    /// Create a DeliveryFailure error.
    pub fn delivery_failure(reason: impl Into<String>) -> Self {
        Self::DeliveryFailure {
            reason: reason.into(),
        }
    }

    /// Create an UnknownFile error.
    pub fn unknown_file(file_id: impl Into<String>) -> Self {
        Self::UnknownFile {
            file_id: file_id.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an Other error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnreadablePdf { .. } => 3,
            Self::InvalidOrder { .. }
            | Self::DuplicatePage { .. }
            | Self::InvalidRotation { .. }
            | Self::InvalidPageId { .. } => 1,
            Self::RenderFailure { .. } => 6,
            Self::NoPagesToMerge => 1,
            Self::MergeFailed { .. } => 6,
            Self::DeliveryFailure { .. } => 5,
            Self::UnknownFile { .. } | Self::InvalidStorageKey { .. } => 2,
            Self::FailedToWrite { .. } => 5,
            Self::InvalidConfig { .. } => 1,
            Self::Io { .. } => 5,
            Self::Other { .. } => 1,
        }
    }
}
