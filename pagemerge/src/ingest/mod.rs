//! Upload ingestion.
//!
//! Turns raw uploaded files into [`SourceFile`]s and one [`PageDescriptor`]
//! per page. Bytes are persisted to scratch storage before any descriptor is
//! handed out. A file that cannot be parsed is reported in
//! [`IngestReport::rejected`] and its stored bytes are removed again; the
//! remaining files of the batch are unaffected.

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::document::{PageDescriptor, SourceFile};
use crate::error::PageMergeError;
use crate::io::{LoadResult, PdfReader};
use crate::storage::{ScratchStorage, StoredFile};

/// One uploaded file as received from the transport.
#[derive(Debug, Clone)]
pub struct RawFile {
    /// Name the client uploaded the file with.
    pub name: String,

    /// File contents.
    pub bytes: Bytes,
}

impl RawFile {
    /// Create a raw file.
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// An upload that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFile {
    /// Name the client uploaded the file with.
    pub original: String,

    /// Why the file was rejected.
    pub error: String,
}

/// Outcome of ingesting a batch of uploads.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Accepted files, in upload order.
    pub files: Vec<SourceFile>,

    /// Descriptors for every page of every accepted file, in upload order.
    pub pages: Vec<PageDescriptor>,

    /// Files that were rejected, in upload order.
    pub rejected: Vec<RejectedFile>,
}

/// Stores and parses uploads.
#[derive(Debug, Clone)]
pub struct Ingestor {
    storage: ScratchStorage,
    reader: PdfReader,
    jobs: usize,
}

impl Ingestor {
    /// Create an ingestor storing into `storage` and parsing up to `jobs`
    /// files concurrently.
    pub fn new(storage: ScratchStorage, jobs: usize) -> Self {
        Self {
            storage,
            reader: PdfReader::new(),
            jobs: jobs.max(1),
        }
    }

    /// Ingest a batch of uploads.
    ///
    /// Accepted files, pages and rejections all come back in upload order.
    pub async fn ingest(&self, files: Vec<RawFile>) -> IngestReport {
        let mut staged = Vec::with_capacity(files.len());
        let mut to_parse = Vec::with_capacity(files.len());

        for file in files {
            match self.storage.persist(&file.bytes).await {
                Ok(entry) => {
                    to_parse.push((file.name.clone(), file.bytes));
                    staged.push(Ok((file.name, entry)));
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "failed to store upload");
                    staged.push(Err(RejectedFile {
                        original: file.name,
                        error: e.to_string(),
                    }));
                }
            }
        }

        let (results, stats) = self.reader.load_all(to_parse, self.jobs).await;
        let report = self.build_report(staged, results).await;

        info!(
            accepted = report.files.len(),
            rejected = report.rejected.len(),
            pages = report.pages.len(),
            size = %stats.format_total_size(),
            "ingested uploads"
        );

        report
    }

    /// Build the report from the staged uploads and the parse results of the
    /// stored ones, which line up in order.
    async fn build_report(&self, staged: Vec<Staged>, results: Vec<LoadResult>) -> IngestReport {
        let mut report = IngestReport::default();
        let mut results = results.into_iter();

        for upload in staged {
            let (name, entry) = match upload {
                Ok(stored) => stored,
                Err(rejected) => {
                    report.rejected.push(rejected);
                    continue;
                }
            };

            let result = results
                .next()
                .unwrap_or_else(|| Err(PageMergeError::other("Upload was not parsed")));

            match result {
                Ok(loaded) => {
                    let source = SourceFile {
                        file_id: entry.file_id,
                        original_name: name,
                        storage_key: entry.key,
                        page_count: loaded.page_count,
                    };
                    report.pages.extend(source.page_descriptors());
                    report.files.push(source);
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "rejected upload");
                    self.storage.discard(&entry.path).await;
                    report.rejected.push(RejectedFile {
                        original: name,
                        error: rejection_reason(&e),
                    });
                }
            }
        }

        report
    }
}

/// An upload after persisting: its name and storage entry, or why it could
/// not be stored.
type Staged = std::result::Result<(String, StoredFile), RejectedFile>;

fn rejection_reason(err: &PageMergeError) -> String {
    match err {
        PageMergeError::UnreadablePdf { reason, .. } => format!("Unreadable PDF: {reason}"),
        other => other.to_string(),
    }
}
