//! Page-level assembly of the output document.
//!
//! [`PageAssembler`] builds a fresh document one page at a time. Each source
//! document is imported once: its objects are renumbered above everything the
//! output already holds, then individual pages are copied out of it together
//! with the objects they reference.
//!
//! Attributes a page inherits from its page tree (`/Resources`, `/MediaBox`,
//! `/CropBox`, `/Rotate`) are materialized on the copy, since the copy gets a
//! new parent.

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use std::collections::HashMap;

use crate::document::{FileId, PageRotation};
use crate::error::{PageMergeError, Result};
use crate::utils::copy_references;

const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Producer string written into the output's Info dictionary.
pub const PRODUCER: &str = concat!("pagemerge ", env!("CARGO_PKG_VERSION"));

struct ImportedSource {
    document: Document,
    /// Page object ids in document order.
    page_ids: Vec<ObjectId>,
}

/// Builds a new document from pages of imported sources.
pub struct PageAssembler {
    output: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    sources: HashMap<FileId, ImportedSource>,
}

impl PageAssembler {
    /// Create an assembler with an empty output document.
    pub fn new() -> Self {
        let mut output = Document::with_version("1.5");
        let pages_id = output.new_object_id();

        Self {
            output,
            pages_id,
            kids: Vec::new(),
            sources: HashMap::new(),
        }
    }

    /// Whether `file` has already been imported.
    pub fn has_source(&self, file: &FileId) -> bool {
        self.sources.contains_key(file)
    }

    /// Make the pages of `document` available for copying under `file`.
    ///
    /// Importing the same file twice replaces the earlier import.
    pub fn import_source(&mut self, file: FileId, mut document: Document) {
        document.renumber_objects_with(self.output.max_id + 1);
        self.output.max_id = self.output.max_id.max(document.max_id);

        let page_ids = document.get_pages().into_values().collect();
        self.sources.insert(file, ImportedSource { document, page_ids });
    }

    /// Append page `page_index` (zero-based) of `file` to the output.
    ///
    /// `rotation` is added to the rotation the page already has.
    ///
    /// # Errors
    ///
    /// Returns [`PageMergeError::MergeFailed`] if the file was not imported
    /// or has no such page.
    pub fn copy_page(
        &mut self,
        file: &FileId,
        page_index: u32,
        rotation: PageRotation,
    ) -> Result<ObjectId> {
        let source = self
            .sources
            .get(file)
            .ok_or_else(|| PageMergeError::merge_failed(format!("Source {file} was not opened")))?;

        let source_page_id = *source.page_ids.get(page_index as usize).ok_or_else(|| {
            PageMergeError::merge_failed(format!(
                "Page {} does not exist in source {file} ({} pages)",
                page_index + 1,
                source.page_ids.len()
            ))
        })?;

        let mut page = source
            .document
            .get_dictionary(source_page_id)
            .map_err(|e| PageMergeError::merge_failed(format!("Failed to read page: {e}")))?
            .clone();

        for key in INHERITABLE_KEYS {
            if !page.has(key)
                && let Some(value) = inherited_attribute(&source.document, &page, key)
            {
                page.set(key.to_vec(), value);
            }
        }

        let current = page.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
        let total = (current + i64::from(rotation.as_degrees())).rem_euclid(360);
        if total != 0 || page.has(b"Rotate") {
            page.set("Rotate", Object::Integer(total));
        }

        page.set("Parent", Object::Reference(self.pages_id));

        let page_object = Object::Dictionary(page);
        copy_references(&mut self.output, &source.document, &page_object);

        // A page that was already copied keeps its first id; later copies get a fresh one.
        let target_id = if self.output.objects.contains_key(&source_page_id) {
            self.output.new_object_id()
        } else {
            source_page_id
        };
        self.output.objects.insert(target_id, page_object);
        self.kids.push(target_id);

        Ok(target_id)
    }

    /// Number of pages copied so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Close the page tree and return the finished document.
    ///
    /// `title` is written into the Info dictionary. No timestamps are added,
    /// so the same inputs always produce the same document.
    pub fn finish(mut self, title: &str) -> Document {
        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();
        let count = kids.len() as i64;

        self.output.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.output.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.output.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal(PRODUCER),
        });

        self.output.trailer.set("Root", catalog_id);
        self.output.trailer.set("Info", info_id);

        self.output
    }
}

impl Default for PageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up `key` on the ancestors of `page`, nearest first.
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(parent_id) = parent {
        // Guard against cyclic page trees.
        if depth > 64 {
            return None;
        }
        let node = doc.get_dictionary(parent_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    None
}
