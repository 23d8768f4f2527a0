//! PDF rasterisation: open a document from bytes and render pages to images.
//!
//! The pipeline talks to the rendering engine only through [`RenderEngine`]
//! and [`DocumentHandle`], so the page loop can be driven by pdfium in
//! production and by an in-memory engine in tests.
//!
//! ## Handle lifetime
//!
//! Closing a document is tied to `Drop`: `PdfiumDocument` wraps
//! `pdfium_render::PdfDocument`, whose destructor calls `FPDF_CloseDocument`.
//! A handle cannot outlive the bytes or the engine it borrows from, and every
//! early return in the page loop releases it exactly once.
//!
//! ## Page indices
//!
//! `render_page` takes a zero-based index in `[0, page_count)`. One-based
//! numbers appear only in log lines and error messages.

use crate::error::ExtractError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF points per inch; pdfium page sizes are expressed in points.
const POINTS_PER_INCH: f32 = 72.0;

/// An engine able to open PDF documents from memory.
pub trait RenderEngine: Send + Sync {
    /// Parse `bytes` into an open document.
    ///
    /// Fails with [`ExtractError::InvalidDocument`] if the bytes are not a
    /// readable PDF.
    fn open_document<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Result<Box<dyn DocumentHandle + 'a>, ExtractError>;
}

/// An open document. Dropping it closes the document in the engine.
pub trait DocumentHandle {
    fn page_count(&self) -> Result<usize, ExtractError>;

    /// Rasterise the zero-based page `index` at `dpi`.
    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage, ExtractError>;
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`RenderEngine`] backed by a bound pdfium library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
}

impl PdfiumEngine {
    /// Bind to pdfium, trying `lib_dir` first when given, then the working
    /// directory, then the system library path.
    pub fn bind(lib_dir: Option<&Path>) -> Result<Self, ExtractError> {
        let mut candidates: Vec<PathBuf> = lib_dir.map(Path::to_path_buf).into_iter().collect();
        candidates.push(PathBuf::from("./"));

        let mut bound = None;
        for dir in &candidates {
            match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)) {
                Ok(bindings) => {
                    info!("pdfium bound from {}", dir.display());
                    bound = Some(bindings);
                    break;
                }
                Err(e) => debug!("pdfium not found in {}: {:?}", dir.display(), e),
            }
        }

        let bindings = match bound {
            Some(bindings) => bindings,
            None => Pdfium::bind_to_system_library()
                .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{e:?}")))?,
        };

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl RenderEngine for PdfiumEngine {
    fn open_document<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Result<Box<dyn DocumentHandle + 'a>, ExtractError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| {
                let detail = format!("{e:?}");
                if detail.contains("Password") || detail.contains("password") {
                    ExtractError::InvalidDocument {
                        detail: "PDF is password protected".to_string(),
                    }
                } else {
                    ExtractError::InvalidDocument { detail }
                }
            })?;

        debug!("Opened PDF ({} bytes)", bytes.len());
        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl DocumentHandle for PdfiumDocument<'_> {
    fn page_count(&self) -> Result<usize, ExtractError> {
        Ok(self.document.pages().len() as usize)
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage, ExtractError> {
        let page_index = u16::try_from(index).map_err(|_| ExtractError::RenderFailure {
            page: index + 1,
            detail: "page index exceeds pdfium's u16 range".to_string(),
        })?;

        let page = self
            .document
            .pages()
            .get(page_index)
            .map_err(|e| ExtractError::RenderFailure {
                page: index + 1,
                detail: format!("{e:?}"),
            })?;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ExtractError::RenderFailure {
                page: index + 1,
                detail: format!("{e:?}"),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} at {} DPI → {}x{} px",
            index + 1,
            dpi,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn assert_shareable<T: Send + Sync>() {}

    #[test]
    fn pdfium_engine_is_shareable_across_threads() {
        assert_shareable::<PdfiumEngine>();
        assert_shareable::<Arc<dyn RenderEngine>>();
    }
}
