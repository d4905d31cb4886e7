//! Service configuration and page selection parsing.
//!
//! [`Config`] carries everything needed to run the HTTP service. The CLI
//! builds it from arguments and environment variables, and [`Config::validate`]
//! rejects inconsistent values before anything starts.
//!
//! [`PageSelection`] parses the `--pages` argument of the local merge command.

use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::CacheOptions;
use crate::document::PageRotation;
use crate::error::{PageMergeError, Result};

/// Default address the service listens on.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";

/// Default upper bound for one upload request, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Complete configuration for the page merge service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding uploads and merge output.
    pub storage_dir: PathBuf,

    /// Address to listen on.
    pub bind_address: SocketAddr,

    /// Render tiers and batch size of the page cache.
    pub cache: CacheOptions,

    /// Number of uploads parsed concurrently (None = auto-detect).
    pub jobs: Option<usize>,

    /// Largest accepted upload request body, in bytes.
    pub max_upload_bytes: usize,

    /// Directory containing the pdfium library (None = system library).
    pub pdfium_library_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: std::env::temp_dir().join("pagemerge"),
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            cache: CacheOptions::default(),
            jobs: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            pdfium_library_dir: None,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A render tier has an unusable scale or JPEG quality
    /// - The preview tier renders larger than the full tier
    /// - Batch size, job count or upload limit is zero
    pub fn validate(&self) -> Result<()> {
        self.cache.preview.validate()?;
        self.cache.full.validate()?;

        if self.cache.preview.scale > self.cache.full.scale {
            return Err(PageMergeError::invalid_config(format!(
                "Preview scale ({}) must not exceed full scale ({})",
                self.cache.preview.scale, self.cache.full.scale
            )));
        }

        if self.cache.batch_size == 0 {
            return Err(PageMergeError::invalid_config(
                "Render batch size must be at least 1",
            ));
        }

        if let Some(jobs) = self.jobs
            && jobs == 0
        {
            return Err(PageMergeError::invalid_config(
                "Number of jobs must be at least 1",
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err(PageMergeError::invalid_config(
                "Upload limit must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Get the effective number of parallel jobs.
    ///
    /// Returns the configured job count, or the number of CPU cores if auto-detect.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// A page or page range picked for a local merge.
///
/// Ranges stay unexpanded until they are checked against the page count of
/// the file they point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSelection {
    /// Zero-based index into the list of input files.
    pub file: usize,

    /// Zero-based index of the first page picked.
    pub first_page: u32,

    /// Zero-based index of the last page picked, inclusive.
    pub last_page: u32,

    /// Rotation added to every picked page.
    pub rotation: PageRotation,
}

impl PageSelection {
    /// Parse a comma or whitespace separated list of selections.
    ///
    /// Each token is `<file#>:<page#>` or `<file#>:<from>-<to>`, with an
    /// optional `@<degrees>` suffix. File and page numbers are one-based.
    ///
    /// # Examples
    ///
    /// ```
    /// use pagemerge::config::PageSelection;
    ///
    /// let picks = PageSelection::parse_list("2:1, 1:1-2@90").unwrap();
    /// assert_eq!(picks.len(), 2);
    /// assert_eq!((picks[0].file, picks[0].first_page), (1, 0));
    /// assert_eq!(picks[1].page_indices().collect::<Vec<_>>(), vec![0, 1]);
    /// assert_eq!(picks[1].rotation.as_degrees(), 90);
    /// ```
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        let selections = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(Self::parse_token)
            .collect::<Result<Vec<_>>>()?;

        if selections.is_empty() {
            return Err(PageMergeError::invalid_config("Page selection cannot be empty"));
        }

        Ok(selections)
    }

    /// Zero-based indices of the picked pages, in order.
    pub fn page_indices(&self) -> RangeInclusive<u32> {
        self.first_page..=self.last_page
    }

    /// Number of pages picked.
    pub fn page_count(&self) -> u64 {
        u64::from(self.last_page - self.first_page) + 1
    }

    fn parse_token(token: &str) -> Result<Self> {
        let invalid = |detail: &str| {
            PageMergeError::invalid_config(format!(
                "Invalid page selection '{token}': {detail}. Expected format like '1:3' or '2:1-4@90'"
            ))
        };

        let (location, rotation) = match token.split_once('@') {
            Some((location, degrees)) => {
                let degrees: i32 = degrees
                    .trim()
                    .parse()
                    .map_err(|_| invalid("rotation is not a number"))?;
                (location, PageRotation::from_degrees(degrees)?)
            }
            None => (token, PageRotation::None),
        };

        let (file, pages) = location
            .split_once(':')
            .ok_or_else(|| invalid("missing ':'"))?;

        let file = parse_one_based(file).ok_or_else(|| invalid("file number must be positive"))?;

        let (first_page, last_page) = match pages.split_once('-') {
            Some((first, last)) => (
                parse_one_based(first).ok_or_else(|| invalid("page numbers must be positive"))?,
                parse_one_based(last).ok_or_else(|| invalid("page numbers must be positive"))?,
            ),
            None => {
                let page =
                    parse_one_based(pages).ok_or_else(|| invalid("page numbers must be positive"))?;
                (page, page)
            }
        };

        if first_page > last_page {
            return Err(invalid("start page must not be after end page"));
        }

        Ok(Self {
            file: file as usize,
            first_page,
            last_page,
            rotation,
        })
    }
}

impl FromStr for PageSelection {
    type Err = PageMergeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_token(s.trim())
    }
}

/// Parse a one-based number into a zero-based index.
fn parse_one_based(s: &str) -> Option<u32> {
    s.trim().parse::<u32>().ok()?.checked_sub(1)
}
