//! One editing session: uploads, the page order and rendered pages.
//!
//! [`EditSession`] keeps the page order, the uploaded files and the page
//! cache consistent with each other. Removing a page evicts its images;
//! removing a file removes all of its pages, their images and its stored
//! bytes. A session ends either by merging, which consumes it, or by
//! [`EditSession::close`]; both remove every scratch file the session owns.

use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::cache::{BatchReport, PageCache};
use crate::document::{FileId, PageDescriptor, PageId, SourceFile};
use crate::error::{PageMergeError, Result};
use crate::ingest::{IngestReport, Ingestor, RawFile};
use crate::merge::{MergeEngine, MergedDocument};
use crate::order::PageOrder;
use crate::render::RenderTier;
use crate::storage::ScratchStorage;

/// State of a single editing session.
#[derive(Debug)]
pub struct EditSession {
    storage: ScratchStorage,
    ingestor: Ingestor,
    engine: MergeEngine,
    cache: PageCache,
    order: PageOrder,
    files: Vec<SourceFile>,
}

impl EditSession {
    /// Start an empty session.
    ///
    /// `jobs` bounds how many uploads are parsed concurrently.
    pub fn new(storage: ScratchStorage, cache: PageCache, jobs: usize) -> Self {
        Self {
            ingestor: Ingestor::new(storage.clone(), jobs),
            engine: MergeEngine::new(storage.clone()),
            storage,
            cache,
            order: PageOrder::new(),
            files: Vec::new(),
        }
    }

    /// Ingest uploads and append their pages to the end of the order.
    pub async fn upload(&mut self, files: Vec<RawFile>) -> Result<IngestReport> {
        let report = self.ingestor.ingest(files).await;

        self.order.append(report.pages.iter().cloned())?;
        self.files.extend(report.files.iter().cloned());

        Ok(report)
    }

    /// Current page order.
    pub fn order(&self) -> &PageOrder {
        &self.order
    }

    /// Copy of the current page sequence.
    pub fn pages(&self) -> Vec<PageDescriptor> {
        self.order.snapshot()
    }

    /// Files uploaded in this session, in upload order.
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Remove one page and its cached images.
    pub fn remove_page(&mut self, id: &PageId) -> Option<PageDescriptor> {
        let removed = self.order.remove(id)?;
        self.cache.evict(id);
        Some(removed)
    }

    /// Remove a file together with all of its pages, images and stored bytes.
    ///
    /// Returns the pages that were removed.
    pub async fn remove_file(&mut self, file: &FileId) -> Result<Vec<PageDescriptor>> {
        let position = self
            .files
            .iter()
            .position(|f| &f.file_id == file)
            .ok_or_else(|| PageMergeError::unknown_file(file.as_str()))?;

        let source = self.files.remove(position);
        let removed = self.order.remove_by_source_file(file);
        self.cache.evict_file(file);
        self.storage.remove(&source.storage_key).await?;

        debug!(file = %file, pages = removed.len(), "removed file from session");
        Ok(removed)
    }

    /// Replace the order with a permutation of the current pages.
    pub fn reorder(&mut self, new_sequence: &[PageId]) -> Result<()> {
        self.order.reorder(new_sequence)
    }

    /// Rotate one page by `delta_degrees`. Cached images stay valid.
    pub fn rotate(&mut self, id: &PageId, delta_degrees: i32) -> Result<Option<i32>> {
        self.order.rotate(id, delta_degrees)
    }

    /// Render previews of every page, in order, in batches.
    pub async fn render_previews(&self) -> BatchReport {
        self.cache
            .render_batch(RenderTier::Preview, &self.order.snapshot())
            .await
    }

    /// Preview image of page `id`.
    pub async fn preview(&self, id: &PageId) -> Result<Bytes> {
        self.image(RenderTier::Preview, id).await
    }

    /// Full-size image of page `id`.
    pub async fn full(&self, id: &PageId) -> Result<Bytes> {
        self.image(RenderTier::Full, id).await
    }

    /// Storage key of every file in the session.
    pub fn file_locations(&self) -> HashMap<FileId, String> {
        self.files
            .iter()
            .map(|f| (f.file_id.clone(), f.storage_key.clone()))
            .collect()
    }

    /// Merge the current order into one document and end the session.
    ///
    /// Every scratch file of the session is gone afterwards, including files
    /// none of whose pages made it into the output.
    pub async fn merge(self, output_name: &str) -> Result<MergedDocument> {
        let result = self
            .engine
            .merge(&self.order.snapshot(), &self.file_locations(), output_name)
            .await;

        self.close().await;
        result
    }

    /// End the session, removing its files and cached images.
    pub async fn close(self) {
        for file in &self.files {
            self.cache.evict_file(&file.file_id);
            if let Ok(path) = self.storage.resolve(&file.storage_key) {
                self.storage.discard(&path).await;
            }
        }
        info!(files = self.files.len(), "closed session");
    }

    async fn image(&self, tier: RenderTier, id: &PageId) -> Result<Bytes> {
        let page = self
            .order
            .get(id)
            .ok_or_else(|| PageMergeError::InvalidPageId { id: id.to_string() })?;
        self.cache.get_or_render(tier, page).await
    }
}
