//! Page and file identity.
//!
//! A [`PageDescriptor`] identifies one page of one uploaded [`SourceFile`]
//! together with the rotation the user has applied to it. Descriptors carry no
//! position: where a page ends up in the output is decided solely by its
//! place in the [`crate::order::PageOrder`].
//!
//! Page ids are derived from `(file id, page index)` and can always be parsed
//! back, so no lookup table is needed to find the source of a page:
//!
//! ```
//! use pagemerge::document::{FileId, PageId};
//!
//! let file = FileId::from("3f2a");
//! let id = PageId::derive(&file, 4);
//! assert_eq!(id.as_str(), "3f2a_page_4");
//! assert_eq!(id.parse().unwrap(), (file, 4));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PageMergeError, Result};

const PAGE_ID_SEPARATOR: &str = "_page_";

/// Identifier of one uploaded file, unique per upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Generate a fresh random file id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of one page, `"<file id>_page_<index>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Derive the id of page `page_index` (zero-based) of `file`.
    pub fn derive(file: &FileId, page_index: u32) -> Self {
        Self(format!("{file}{PAGE_ID_SEPARATOR}{page_index}"))
    }

    /// Recover the file id and zero-based page index this id was derived from.
    ///
    /// # Errors
    ///
    /// Returns [`PageMergeError::InvalidPageId`] if the id was not produced by
    /// [`PageId::derive`].
    pub fn parse(&self) -> Result<(FileId, u32)> {
        let invalid = || PageMergeError::InvalidPageId {
            id: self.0.clone(),
        };

        let (file, index) = self.0.rsplit_once(PAGE_ID_SEPARATOR).ok_or_else(invalid)?;
        // Only the canonical form, so "x_page_01" cannot alias "x_page_1".
        let canonical = !index.is_empty()
            && index.bytes().all(|b| b.is_ascii_digit())
            && (index == "0" || !index.starts_with('0'));
        if file.is_empty() || !canonical {
            return Err(invalid());
        }
        let index = index.parse::<u32>().map_err(|_| invalid())?;

        Ok((FileId::from(file), index))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Page rotation angles.
///
/// Serialized as plain degrees (`0`, `90`, `180`, `270`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum PageRotation {
    /// No rotation.
    #[default]
    None,
    /// Rotate 90 degrees clockwise.
    Clockwise90,
    /// Rotate 180 degrees.
    Rotate180,
    /// Rotate 270 degrees clockwise.
    Clockwise270,
}

impl PageRotation {
    /// Parse rotation from degrees.
    ///
    /// Any multiple of 90 is accepted and normalized into `[0, 360)`, so
    /// `-90` becomes [`PageRotation::Clockwise270`].
    ///
    /// # Errors
    ///
    /// Returns an error if `degrees` is not a multiple of 90.
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(PageMergeError::InvalidRotation { degrees });
        }

        Ok(match degrees.rem_euclid(360) {
            90 => Self::Clockwise90,
            180 => Self::Rotate180,
            270 => Self::Clockwise270,
            _ => Self::None,
        })
    }

    /// Get rotation as degrees.
    pub fn as_degrees(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::Clockwise90 => 90,
            Self::Rotate180 => 180,
            Self::Clockwise270 => 270,
        }
    }

    /// Add `delta` degrees, wrapping modulo 360.
    ///
    /// # Errors
    ///
    /// Returns an error if `delta` is not a multiple of 90.
    pub fn rotated_by(self, delta: i32) -> Result<Self> {
        if delta % 90 != 0 {
            return Err(PageMergeError::InvalidRotation { degrees: delta });
        }
        Self::from_degrees(self.as_degrees() + delta.rem_euclid(360))
    }

    /// Whether this rotation leaves the page untouched.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl TryFrom<i32> for PageRotation {
    type Error = PageMergeError;

    fn try_from(degrees: i32) -> Result<Self> {
        Self::from_degrees(degrees)
    }
}

impl From<PageRotation> for i32 {
    fn from(rotation: PageRotation) -> Self {
        rotation.as_degrees()
    }
}

/// One page of one uploaded file, as positioned in the merge sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    /// Stable page id derived from `file` and `page_index`.
    pub id: PageId,

    /// File this page belongs to.
    pub file: FileId,

    /// Zero-based index of the page inside its file.
    pub page_index: u32,

    /// Display name of the file the page came from.
    #[serde(default)]
    pub original_file: String,

    /// One-based page number inside the original file.
    #[serde(default)]
    pub original_page: u32,

    /// Rotation applied on top of the page's own orientation.
    #[serde(default)]
    pub rotation: PageRotation,
}

impl PageDescriptor {
    /// Create an unrotated descriptor for page `page_index` of `file`.
    pub fn new(file: FileId, page_index: u32, original_file: impl Into<String>) -> Self {
        Self {
            id: PageId::derive(&file, page_index),
            file,
            page_index,
            original_file: original_file.into(),
            original_page: page_index + 1,
            rotation: PageRotation::None,
        }
    }

    /// Rebuild a descriptor from a page id alone.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` was not derived from a file id and page index.
    pub fn from_id(id: &PageId) -> Result<Self> {
        let (file, page_index) = id.parse()?;
        Ok(Self::new(file, page_index, String::new()))
    }

    /// Human readable label, e.g. `"report.pdf - Pg 3"`.
    pub fn display_label(&self) -> String {
        format!("{} - Pg {}", self.original_file, self.page_index + 1)
    }
}

/// One uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// Unique id of this upload.
    pub file_id: FileId,

    /// Name the file was uploaded with. Display only.
    pub original_name: String,

    /// Key of the stored bytes inside scratch storage.
    pub storage_key: String,

    /// Number of pages in the document.
    pub page_count: u32,
}

impl SourceFile {
    /// One unrotated descriptor per page, in document order.
    pub fn page_descriptors(&self) -> Vec<PageDescriptor> {
        (0..self.page_count)
            .map(|index| PageDescriptor::new(self.file_id.clone(), index, &self.original_name))
            .collect()
    }
}
