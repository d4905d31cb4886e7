//! PDF parsing.
//!
//! Uploads arrive as bytes, so documents are parsed from memory. Parsing is
//! CPU bound and runs on the blocking pool.
//!
//! # Examples
//!
//! ```no_run
//! use bytes::Bytes;
//! use pagemerge::io::PdfReader;
//!
//! # async fn example(bytes: Bytes) -> Result<(), Box<dyn std::error::Error>> {
//! let reader = PdfReader::new();
//! let loaded = reader.load_bytes("report.pdf", bytes).await?;
//! println!("{} pages", loaded.page_count);
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use lopdf::Document;
use std::time::{Duration, Instant};
use tokio::task;

use crate::error::{PageMergeError, Result};
use crate::utils::format_file_size;

/// A parsed PDF document with load metadata.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The PDF document.
    pub document: Document,

    /// Name the bytes were loaded under.
    pub name: String,

    /// Number of pages in the document.
    pub page_count: u32,

    /// Time taken to parse the document.
    pub load_time: Duration,

    /// Size of the parsed bytes.
    pub file_size: u64,
}

/// Result of a load operation (success or failure).
pub type LoadResult = Result<LoadedPdf>;

/// Statistics for a batch load operation.
#[derive(Debug, Clone, Default)]
pub struct LoadStatistics {
    /// Number of PDFs successfully loaded.
    pub success_count: usize,

    /// Number of PDFs that failed to load.
    pub failure_count: usize,

    /// Wall time for the whole batch.
    pub total_time: Duration,

    /// Total size of successfully loaded files.
    pub total_size: u64,

    /// Total number of pages loaded.
    pub total_pages: u64,
}

impl LoadStatistics {
    fn from_results(results: &[LoadResult], total_time: Duration) -> Self {
        let mut stats = Self {
            total_time,
            ..Self::default()
        };

        for result in results {
            match result {
                Ok(loaded) => {
                    stats.success_count += 1;
                    stats.total_size += loaded.file_size;
                    stats.total_pages += u64::from(loaded.page_count);
                }
                Err(_) => stats.failure_count += 1,
            }
        }

        stats
    }

    /// Format total size as human-readable string.
    pub fn format_total_size(&self) -> String {
        format_file_size(self.total_size)
    }
}

/// Parses PDF bytes into [`lopdf::Document`]s.
///
/// Documents without pages are rejected.
#[derive(Debug, Clone, Default)]
pub struct PdfReader;

impl PdfReader {
    /// Create a reader.
    pub fn new() -> Self {
        Self
    }

    /// Parse `bytes` as a PDF document.
    ///
    /// `name` is only used in error messages and logs.
    ///
    /// # Errors
    ///
    /// Returns [`PageMergeError::UnreadablePdf`] if the bytes are not a PDF
    /// lopdf can open, or if the document has no pages.
    pub async fn load_bytes(&self, name: &str, bytes: Bytes) -> Result<LoadedPdf> {
        let name = name.to_string();

        task::spawn_blocking(move || {
            let start = Instant::now();
            let file_size = bytes.len() as u64;

            let document = Document::load_mem(&bytes).map_err(|e| {
                let message = e.to_string();
                if message.contains("encrypt") || message.contains("password") {
                    PageMergeError::unreadable_pdf(&name, "PDF is encrypted")
                } else {
                    PageMergeError::unreadable_pdf(&name, message)
                }
            })?;

            let page_count = document.get_pages().len() as u32;
            if page_count == 0 {
                return Err(PageMergeError::unreadable_pdf(&name, "PDF has no pages"));
            }

            Ok(LoadedPdf {
                document,
                name,
                page_count,
                load_time: start.elapsed(),
                file_size,
            })
        })
        .await
        .map_err(|e| PageMergeError::other(format!("Load task failed: {e}")))?
    }

    /// Parse several documents with at most `workers` parses in flight.
    ///
    /// Results come back in input order.
    pub async fn load_all(
        &self,
        inputs: Vec<(String, Bytes)>,
        workers: usize,
    ) -> (Vec<LoadResult>, LoadStatistics) {
        let start = Instant::now();
        let workers = workers.max(1);

        let tasks = inputs.into_iter().enumerate().map(|(idx, (name, bytes))| {
            let reader = self.clone();
            async move { (idx, reader.load_bytes(&name, bytes).await) }
        });

        let mut indexed: Vec<(usize, LoadResult)> = stream::iter(tasks)
            .buffer_unordered(workers)
            .collect()
            .await;
        indexed.sort_by_key(|(idx, _)| *idx);

        let results: Vec<LoadResult> = indexed.into_iter().map(|(_, r)| r).collect();
        let stats = LoadStatistics::from_results(&results, start.elapsed());

        (results, stats)
    }
}
