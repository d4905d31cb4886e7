//! PDF serialization.
//!
//! Documents are serialized to memory; where the bytes end up is decided by
//! scratch storage or the caller.

use bytes::Bytes;
use lopdf::Document;
use tokio::task;

use crate::error::{PageMergeError, Result};

/// Serializes documents to PDF bytes.
///
/// Content streams are compressed and objects renumbered densely first.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter;

impl PdfWriter {
    /// Create a writer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize `doc` into PDF bytes.
    ///
    /// Serializing the same document twice yields identical bytes.
    pub async fn to_bytes(&self, mut doc: Document) -> Result<Bytes> {
        task::spawn_blocking(move || {
            doc.compress();
            doc.renumber_objects();

            let mut buffer = Vec::new();
            doc.save_to(&mut buffer)
                .map_err(|e| PageMergeError::merge_failed(format!("Failed to serialize PDF: {e}")))?;

            Ok(Bytes::from(buffer))
        })
        .await
        .map_err(|e| PageMergeError::other(format!("Write task failed: {e}")))?
    }
}
