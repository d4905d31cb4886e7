//! Page rasterisation.
//!
//! A [`Rasterizer`] turns one page of a PDF into encoded image bytes. The
//! default implementation, [`PdfiumRasterizer`], renders through pdfium and
//! encodes the bitmap as JPEG. Rasterisers are blocking; callers run them on
//! the blocking pool.
//!
//! Pages are rendered in their stored orientation. User rotation is applied
//! by whoever displays the image, so rotating a page never invalidates its
//! rendered images.

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

use crate::error::{PageMergeError, Result};

/// Resolution tier of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderTier {
    /// Small thumbnail shown in the page grid.
    Preview,
    /// Large rendering shown on demand.
    Full,
}

impl RenderTier {
    /// Lowercase name used in URLs and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for RenderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderTier {
    type Err = PageMergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "preview" | "thumbnail" => Ok(Self::Preview),
            "full" => Ok(Self::Full),
            other => Err(PageMergeError::other(format!(
                "Unknown render tier '{other}'. Use 'preview' or 'full'"
            ))),
        }
    }
}

/// How one tier is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSettings {
    /// Scale factor applied to the page's size in points.
    pub scale: f32,

    /// JPEG quality, 1 to 100.
    pub jpeg_quality: u8,
}

impl TierSettings {
    /// Default settings for preview thumbnails.
    pub const PREVIEW: Self = Self {
        scale: 0.5,
        jpeg_quality: 80,
    };

    /// Default settings for full-size renderings.
    pub const FULL: Self = Self {
        scale: 2.0,
        jpeg_quality: 90,
    };

    /// Check that scale and quality are usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0 && self.scale <= 10.0) {
            return Err(PageMergeError::invalid_config(format!(
                "Render scale must be in (0, 10], got {}",
                self.scale
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(PageMergeError::invalid_config(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Renders a single page of a PDF to encoded image bytes.
pub trait Rasterizer: Send + Sync + 'static {
    /// Render page `page_index` (zero-based) of the PDF in `pdf`.
    ///
    /// This call blocks.
    fn rasterize(&self, pdf: &[u8], page_index: u32, settings: &TierSettings) -> Result<Vec<u8>>;
}

/// [`Rasterizer`] backed by the pdfium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Use the pdfium library installed on the system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load pdfium from `dir` instead of the system library path.
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(dir.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium> {
        let bindings = match &self.library_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PageMergeError::other(format!("Failed to load pdfium: {e:?}")))?;

        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf: &[u8], page_index: u32, settings: &TierSettings) -> Result<Vec<u8>> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PageMergeError::other(format!("Failed to open PDF: {e:?}")))?;

        let pages = document.pages();
        let index = u16::try_from(page_index)
            .ok()
            .filter(|idx| *idx < pages.len())
            .ok_or_else(|| {
                PageMergeError::other(format!(
                    "Page {} out of range ({} pages)",
                    page_index + 1,
                    pages.len()
                ))
            })?;

        let page = pages
            .get(index)
            .map_err(|e| PageMergeError::other(format!("Failed to read page: {e:?}")))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(settings.scale);
        let image = page
            .render_with_config(&render_config)
            .map_err(|e| PageMergeError::other(format!("Failed to render page: {e:?}")))?
            .as_image();

        debug!(
            page = page_index + 1,
            width = image.width(),
            height = image.height(),
            "rendered page"
        );

        encode_jpeg(&image, settings.jpeg_quality)
    }
}

/// Encode `image` as a baseline JPEG.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();

    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(&rgb)
        .map_err(|e| PageMergeError::other(format!("Failed to encode JPEG: {e}")))?;

    Ok(buffer)
}
