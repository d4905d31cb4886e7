//! The merge engine.
//!
//! Turns a final page order into one PDF. Sources are opened lazily, on the
//! first page that needs them, and every source that was touched is removed
//! from scratch storage when the merge ends, whether it succeeded or not.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::document::{FileId, PageDescriptor};
use crate::error::{PageMergeError, Result};
use crate::io::{PdfReader, PdfWriter};
use crate::merge::pages::PageAssembler;
use crate::storage::ScratchStorage;
use crate::utils::{format_file_size, sanitize_file_stem};

/// Statistics about a merge operation.
#[derive(Debug, Clone)]
pub struct MergeStatistics {
    /// Number of distinct source files opened.
    pub files_merged: usize,

    /// Number of pages in the merged document.
    pub total_pages: usize,

    /// Total time taken for the merge.
    pub merge_time: Duration,

    /// Total size of the opened sources.
    pub input_size: u64,
}

impl MergeStatistics {
    /// Format input size as human-readable string.
    pub fn format_input_size(&self) -> String {
        format_file_size(self.input_size)
    }
}

/// A merged document ready to be delivered.
#[derive(Debug, Clone)]
pub struct MergedDocument {
    /// Output file name, always ending in `.pdf`.
    pub file_name: String,

    /// Serialized PDF.
    pub bytes: Bytes,

    /// Statistics about the merge.
    pub statistics: MergeStatistics,
}

/// Assembles merged documents from scratch storage.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    storage: ScratchStorage,
    reader: PdfReader,
    writer: PdfWriter,
}

impl MergeEngine {
    /// Create an engine reading sources from `storage`.
    pub fn new(storage: ScratchStorage) -> Self {
        Self {
            storage,
            reader: PdfReader::new(),
            writer: PdfWriter::new(),
        }
    }

    /// Merge `order` into a single document named after `output_name`.
    ///
    /// `file_locations` maps every file id used in `order` to its storage
    /// key. Pages are copied in exactly the given order, each with its
    /// rotation added to the page's own. The backing file of every source
    /// that was opened is removed before this returns, on success and on
    /// failure alike.
    ///
    /// # Errors
    ///
    /// Returns [`PageMergeError::NoPagesToMerge`] for an empty order and
    /// [`PageMergeError::MergeFailed`] if a source is unknown or unreadable,
    /// a page does not exist, or the output cannot be serialized.
    pub async fn merge(
        &self,
        order: &[PageDescriptor],
        file_locations: &HashMap<FileId, String>,
        output_name: &str,
    ) -> Result<MergedDocument> {
        if order.is_empty() {
            return Err(PageMergeError::NoPagesToMerge);
        }

        let mut touched = Vec::new();
        let result = self
            .assemble(order, file_locations, output_name, &mut touched)
            .await;

        for key in &touched {
            match self.storage.remove(key).await {
                Ok(_) => debug!(key = %key, "removed merged source"),
                Err(e) => warn!(key = %key, error = %e, "failed to remove merged source"),
            }
        }

        result.map_err(|e| match e {
            PageMergeError::MergeFailed { .. } | PageMergeError::NoPagesToMerge => e,
            other => PageMergeError::merge_failed(other.to_string()),
        })
    }

    async fn assemble(
        &self,
        order: &[PageDescriptor],
        file_locations: &HashMap<FileId, String>,
        output_name: &str,
        touched: &mut Vec<String>,
    ) -> Result<MergedDocument> {
        let start = Instant::now();
        let mut assembler = PageAssembler::new();
        let mut input_size = 0;

        for page in order {
            if !assembler.has_source(&page.file) {
                let key = file_locations.get(&page.file).ok_or_else(|| {
                    PageMergeError::merge_failed(format!("No location for source {}", page.file))
                })?;

                // Registered before reading so a failed read is still cleaned up.
                touched.push(key.clone());

                let bytes = self.storage.read(key).await?;
                let loaded = self.reader.load_bytes(page.file.as_str(), bytes).await?;
                debug!(
                    file = %page.file,
                    pages = loaded.page_count,
                    load_time = ?loaded.load_time,
                    "opened merge source"
                );

                input_size += loaded.file_size;
                assembler.import_source(page.file.clone(), loaded.document);
            }

            assembler.copy_page(&page.file, page.page_index, page.rotation)?;
        }

        let stem = sanitize_file_stem(output_name);
        let total_pages = assembler.page_count();
        let document = assembler.finish(&stem);
        let bytes = self.writer.to_bytes(document).await?;

        let statistics = MergeStatistics {
            files_merged: touched.len(),
            total_pages,
            merge_time: start.elapsed(),
            input_size,
        };

        info!(
            pages = statistics.total_pages,
            sources = statistics.files_merged,
            input = %statistics.format_input_size(),
            output = %format_file_size(bytes.len() as u64),
            elapsed = ?statistics.merge_time,
            "merged document"
        );

        Ok(MergedDocument {
            file_name: format!("{stem}.pdf"),
            bytes,
            statistics,
        })
    }

    /// Hand a merged document to `sink` as a file on disk.
    ///
    /// The document is written into scratch storage and its path passed to
    /// `sink`. The file is removed once `sink` completes, whatever its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PageMergeError::DeliveryFailure`] if the file cannot be
    /// written or `sink` fails.
    pub async fn deliver<F, Fut, T, E>(&self, merged: &MergedDocument, sink: F) -> Result<T>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let path = self
            .storage
            .write_output(&merged.file_name, &merged.bytes)
            .await
            .map_err(|e| PageMergeError::delivery_failure(e.to_string()))?;

        let outcome = sink(path.clone()).await;
        self.storage.discard(&path).await;

        outcome.map_err(|e| PageMergeError::delivery_failure(e.to_string()))
    }
}
