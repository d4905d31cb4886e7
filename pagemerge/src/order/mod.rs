//! The authoritative page order.
//!
//! [`PageOrder`] is an ordered collection of [`PageDescriptor`]s spanning any
//! number of source files. Position in the collection is the only thing that
//! decides where a page lands in the merged output.
//!
//! Every mutation either succeeds completely or leaves the order untouched.

use std::collections::{HashMap, HashSet};

use crate::document::{FileId, PageDescriptor, PageId};
use crate::error::{PageMergeError, Result};

/// Ordered sequence of pages to merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOrder {
    pages: Vec<PageDescriptor>,
}

impl PageOrder {
    /// Create an empty page order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append pages at the end, keeping existing pages where they are.
    ///
    /// # Errors
    ///
    /// Returns [`PageMergeError::DuplicatePage`] if any id is already present
    /// or appears twice in `descriptors`. Nothing is appended in that case.
    pub fn append<I>(&mut self, descriptors: I) -> Result<()>
    where
        I: IntoIterator<Item = PageDescriptor>,
    {
        let incoming: Vec<PageDescriptor> = descriptors.into_iter().collect();

        let mut seen: HashSet<&PageId> = self.pages.iter().map(|p| &p.id).collect();
        for page in &incoming {
            if !seen.insert(&page.id) {
                return Err(PageMergeError::DuplicatePage {
                    id: page.id.to_string(),
                });
            }
        }

        self.pages.extend(incoming);
        Ok(())
    }

    /// Remove the page with `id`. Removing an absent page is a no-op.
    pub fn remove(&mut self, id: &PageId) -> Option<PageDescriptor> {
        let position = self.pages.iter().position(|p| &p.id == id)?;
        Some(self.pages.remove(position))
    }

    /// Remove every page that belongs to `file`, returning them in order.
    pub fn remove_by_source_file(&mut self, file: &FileId) -> Vec<PageDescriptor> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pages)
            .into_iter()
            .partition(|p| &p.file == file);
        self.pages = kept;
        removed
    }

    /// Replace the order with a permutation of the current pages.
    ///
    /// Rotations are carried over from the current state.
    ///
    /// # Errors
    ///
    /// Returns [`PageMergeError::InvalidOrder`] unless `new_sequence` holds
    /// exactly the ids currently in the order, each exactly once.
    pub fn reorder(&mut self, new_sequence: &[PageId]) -> Result<()> {
        if new_sequence.len() != self.pages.len() {
            return Err(PageMergeError::invalid_order(format!(
                "expected {} pages, got {}",
                self.pages.len(),
                new_sequence.len()
            )));
        }

        let indices = {
            let mut positions: HashMap<&PageId, usize> = self
                .pages
                .iter()
                .enumerate()
                .map(|(idx, page)| (&page.id, idx))
                .collect();

            let mut indices = Vec::with_capacity(new_sequence.len());
            for id in new_sequence {
                match positions.remove(id) {
                    Some(idx) => indices.push(idx),
                    None if self.contains(id) => {
                        return Err(PageMergeError::invalid_order(format!(
                            "page {id} appears more than once"
                        )));
                    }
                    None => {
                        return Err(PageMergeError::invalid_order(format!(
                            "page {id} is not part of the order"
                        )));
                    }
                }
            }
            indices
        };

        let mut slots: Vec<Option<PageDescriptor>> =
            std::mem::take(&mut self.pages).into_iter().map(Some).collect();
        self.pages = indices
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect();

        Ok(())
    }

    /// Add `delta_degrees` to the rotation of page `id`.
    ///
    /// Returns the new rotation, or `None` if the page is not in the order.
    ///
    /// # Errors
    ///
    /// Returns an error if `delta_degrees` is not a multiple of 90.
    pub fn rotate(&mut self, id: &PageId, delta_degrees: i32) -> Result<Option<i32>> {
        let Some(page) = self.pages.iter_mut().find(|p| &p.id == id) else {
            return Ok(None);
        };

        page.rotation = page.rotation.rotated_by(delta_degrees)?;
        Ok(Some(page.rotation.as_degrees()))
    }

    /// Copy of the current sequence.
    pub fn snapshot(&self) -> Vec<PageDescriptor> {
        self.pages.clone()
    }

    /// Look up a page by id.
    pub fn get(&self, id: &PageId) -> Option<&PageDescriptor> {
        self.pages.iter().find(|p| &p.id == id)
    }

    /// Whether a page with `id` is in the order.
    pub fn contains(&self, id: &PageId) -> bool {
        self.get(id).is_some()
    }

    /// Page ids in order.
    pub fn ids(&self) -> Vec<PageId> {
        self.pages.iter().map(|p| p.id.clone()).collect()
    }

    /// Number of pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the order holds no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Iterate over pages in order.
    pub fn iter(&self) -> std::slice::Iter<'_, PageDescriptor> {
        self.pages.iter()
    }
}
