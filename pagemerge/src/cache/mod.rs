//! Rendered page images, memoized per page and tier.
//!
//! Entries are addressed by `(tier, page id)`, never by position, so
//! reordering pages leaves the cache untouched. Rotation is applied at display
//! time and does not invalidate entries either. Entries only go away through
//! [`PageCache::evict`], [`PageCache::evict_file`] or [`PageCache::clear`].
//!
//! Concurrent requests for the same entry share a single render and all get
//! its outcome. A failed render leaves no entry, so the next request retries.
//! A render that completes after its entry was evicted is handed to the
//! callers that were waiting for it but is not stored.
//!
//! State changes are broadcast as [`RenderEvent`]s so a presentation layer
//! can show placeholders while pages are pending.

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::document::{FileId, PageDescriptor, PageId};
use crate::error::{PageMergeError, Result};
use crate::render::{Rasterizer, RenderTier, TierSettings};
use crate::storage::ScratchStorage;

const EVENT_CAPACITY: usize = 256;

/// Options for a [`PageCache`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheOptions {
    /// Settings for [`RenderTier::Preview`].
    pub preview: TierSettings,

    /// Settings for [`RenderTier::Full`].
    pub full: TierSettings,

    /// Number of pages rendered concurrently by [`PageCache::render_batch`].
    pub batch_size: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            preview: TierSettings::PREVIEW,
            full: TierSettings::FULL,
            batch_size: 5,
        }
    }
}

impl CacheOptions {
    /// Settings used for `tier`.
    pub fn tier(&self, tier: RenderTier) -> TierSettings {
        match tier {
            RenderTier::Preview => self.preview,
            RenderTier::Full => self.full,
        }
    }
}

/// Render state of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    /// Requested but not rendered yet.
    Pending,
    /// Rendered image bytes.
    Ready(Bytes),
    /// The render failed. Only ever seen in [`RenderEvent`]s: a failed
    /// render leaves no entry behind and the next request retries.
    Failed(String),
}

/// A state change of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEvent {
    /// Tier of the entry.
    pub tier: RenderTier,
    /// Page the entry belongs to.
    pub page_id: PageId,
    /// New state.
    pub state: RenderState,
}

/// Outcome of [`PageCache::render_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Pages that are now cached.
    pub rendered: Vec<PageId>,
    /// Pages that failed, with the reason.
    pub failed: Vec<(PageId, PageMergeError)>,
}

type SlotKey = (RenderTier, PageId);

/// A render every concurrent caller of one entry awaits. Errors travel as
/// their message since [`PageMergeError`] is not `Clone`.
type SharedRender = Shared<BoxFuture<'static, std::result::Result<Bytes, String>>>;

struct InFlight {
    generation: u64,
    render: SharedRender,
}

#[derive(Default)]
struct Slot {
    image: Option<Bytes>,
    in_flight: Option<InFlight>,
}

struct Inner {
    storage: ScratchStorage,
    rasterizer: Arc<dyn Rasterizer>,
    options: CacheOptions,
    slots: Mutex<HashMap<SlotKey, Slot>>,
    generations: AtomicU64,
    events: broadcast::Sender<RenderEvent>,
}

/// Two-tier cache of rendered pages.
///
/// Cloning is cheap; clones share the same entries.
#[derive(Clone)]
pub struct PageCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("options", &self.inner.options)
            .field("entries", &self.len())
            .finish()
    }
}

impl PageCache {
    /// Create a cache rendering sources from `storage` with `rasterizer`.
    ///
    /// Sources are looked up by file id, which is also their storage key.
    pub fn new(
        storage: ScratchStorage,
        rasterizer: Arc<dyn Rasterizer>,
        options: CacheOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                storage,
                rasterizer,
                options,
                slots: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// Options this cache was created with.
    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    /// Subscribe to render state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<RenderEvent> {
        self.inner.events.subscribe()
    }

    /// Return the cached image for `page` at `tier`, rendering it if needed.
    ///
    /// Callers arriving while a render of the same entry is running wait for
    /// that render and receive its outcome, success or failure.
    ///
    /// # Errors
    ///
    /// Returns [`PageMergeError::RenderFailure`] if the source cannot be read
    /// or the page cannot be rasterised. Nothing is cached in that case.
    pub async fn get_or_render(&self, tier: RenderTier, page: &PageDescriptor) -> Result<Bytes> {
        let key = (tier, page.id.clone());
        let render = {
            let mut slots = self.slots();
            let slot = slots.entry(key.clone()).or_default();

            if let Some(image) = &slot.image {
                return Ok(image.clone());
            }

            match &slot.in_flight {
                Some(in_flight) => in_flight.render.clone(),
                None => {
                    let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
                    let render = self
                        .clone()
                        .run_render(key, generation, page.clone())
                        .boxed()
                        .shared();
                    slot.in_flight = Some(InFlight {
                        generation,
                        render: render.clone(),
                    });
                    render
                }
            }
        };

        render
            .await
            .map_err(|reason| PageMergeError::render_failure(page.id.as_str(), reason))
    }

    /// Render `pages` at `tier` in batches.
    ///
    /// Batches run one after another; pages within a batch render
    /// concurrently. Failures are collected, never propagated.
    pub async fn render_batch(&self, tier: RenderTier, pages: &[PageDescriptor]) -> BatchReport {
        let mut report = BatchReport::default();
        let batch_size = self.inner.options.batch_size.max(1);

        for batch in pages.chunks(batch_size) {
            let results = join_all(batch.iter().map(|page| self.get_or_render(tier, page))).await;

            for (page, result) in batch.iter().zip(results) {
                match result {
                    Ok(_) => report.rendered.push(page.id.clone()),
                    Err(e) => report.failed.push((page.id.clone(), e)),
                }
            }
        }

        debug!(
            tier = %tier,
            rendered = report.rendered.len(),
            failed = report.failed.len(),
            "rendered batch"
        );
        report
    }

    /// Current state of the entry for `id` at `tier`, if there is one.
    ///
    /// Returns `None` for pages never requested, evicted, or whose last
    /// render failed.
    pub fn state(&self, tier: RenderTier, id: &PageId) -> Option<RenderState> {
        let slots = self.slots();
        let slot = slots.get(&(tier, id.clone()))?;

        Some(match &slot.image {
            Some(image) => RenderState::Ready(image.clone()),
            None => RenderState::Pending,
        })
    }

    /// Drop both tiers of `id`. Returns the number of entries removed.
    pub fn evict(&self, id: &PageId) -> usize {
        let mut slots = self.slots();
        [RenderTier::Preview, RenderTier::Full]
            .into_iter()
            .filter(|tier| slots.remove(&(*tier, id.clone())).is_some())
            .count()
    }

    /// Drop every entry of every page of `file`. Returns the number removed.
    pub fn evict_file(&self, file: &FileId) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|(_, id), _| !matches!(id.parse(), Ok((owner, _)) if &owner == file));
        before - slots.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.slots().clear();
    }

    /// Number of rendered entries.
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.image.is_some())
            .count()
    }

    /// Whether no entry is rendered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn run_render(
        self,
        key: SlotKey,
        generation: u64,
        page: PageDescriptor,
    ) -> std::result::Result<Bytes, String> {
        self.publish(key.0, &key.1, RenderState::Pending);
        let result = self.render(key.0, &page).await;
        self.settle(&key, generation, &result);
        result
    }

    async fn render(&self, tier: RenderTier, page: &PageDescriptor) -> std::result::Result<Bytes, String> {
        let pdf = self
            .inner
            .storage
            .read_file(&page.file)
            .await
            .map_err(|e| e.to_string())?;

        let rasterizer = Arc::clone(&self.inner.rasterizer);
        let settings = self.inner.options.tier(tier);
        let page_index = page.page_index;

        let image = tokio::task::spawn_blocking(move || {
            rasterizer.rasterize(&pdf, page_index, &settings)
        })
        .await
        .map_err(|e| format!("render task failed: {e}"))?
        .map_err(|e| e.to_string())?;

        Ok(Bytes::from(image))
    }

    /// Record the outcome of a render on its slot, unless the slot was
    /// evicted or replaced in the meantime.
    fn settle(&self, key: &SlotKey, generation: u64, result: &std::result::Result<Bytes, String>) {
        let live = {
            let mut slots = self.slots();
            let current = slots
                .get(key)
                .and_then(|slot| slot.in_flight.as_ref())
                .is_some_and(|in_flight| in_flight.generation == generation);

            if current {
                match result {
                    Ok(image) => {
                        slots.insert(
                            key.clone(),
                            Slot {
                                image: Some(image.clone()),
                                in_flight: None,
                            },
                        );
                    }
                    Err(_) => {
                        slots.remove(key);
                    }
                }
            }
            current
        };

        let (tier, id) = key;
        if !live {
            debug!(tier = %tier, page = %id, "discarding render of evicted page");
            return;
        }

        match result {
            Ok(image) => self.publish(*tier, id, RenderState::Ready(image.clone())),
            Err(reason) => {
                warn!(tier = %tier, page = %id, error = %reason, "page render failed");
                self.publish(*tier, id, RenderState::Failed(reason.clone()));
            }
        }
    }

    fn publish(&self, tier: RenderTier, page_id: &PageId, state: RenderState) {
        // Sending only fails when nobody is subscribed.
        let _ = self.inner.events.send(RenderEvent {
            tier,
            page_id: page_id.clone(),
            state,
        });
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<SlotKey, Slot>> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
