//! pdfium-backed collaborators: page range extraction, rasterisation and a
//! terminal preview renderer.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Every entry point here moves the work onto the blocking thread pool so the
//! Tokio workers never stall on CPU-heavy PDF operations.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 12,000 × 17,000 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded and matching the
//! image-size sweet spot for vision models (around 1,024–2,048 px).

use crate::collaborators::{PreviewRenderer, RangeExtractor};
use crate::error::StageError;
use crate::stage::PreviewSurface;
use crate::store::PageRange;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Bind to the pdfium library.
///
/// Prefers the copy cached by `pdfium-auto` (or `PDFIUM_LIB_PATH`) and falls
/// back to the system library.
pub fn bind_pdfium() -> Result<Pdfium, String> {
    if let Some(path) = pdfium_auto::cached_pdfium_path() {
        debug!("Binding pdfium from {}", path.display());
        return pdfium_auto::bind_pdfium_from_path(&path).map_err(|e| e.to_string());
    }
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| format!("PDFium library not available: {:?}", e))
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, String> {
    pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                "wrong password".to_string()
            } else {
                "document is encrypted and needs a password".to_string()
            }
        } else {
            format!("corrupt or unsupported PDF: {}", err_str)
        }
    })
}

fn page_index(page: i64) -> Result<PdfPageIndex, String> {
    PdfPageIndex::try_from(page - 1).map_err(|_| format!("page {} is out of range", page))
}

/// Copy the inclusive 1-indexed `range` of `document` into a new PDF.
pub fn extract_range_blocking(
    document: &[u8],
    range: PageRange,
    password: Option<&str>,
) -> Result<Vec<u8>, String> {
    let pdfium = bind_pdfium()?;
    let source = load_document(&pdfium, document, password)?;

    let total = source.pages().len() as i64;
    if !range.is_well_formed() {
        return Err(format!("invalid page range {}", range));
    }
    if range.end > total {
        return Err(format!(
            "page range {} exceeds the document's {} pages",
            range, total
        ));
    }

    let first = page_index(range.start)?;
    let last = page_index(range.end)?;

    let mut target = pdfium
        .create_new_pdf()
        .map_err(|e| format!("could not create document: {:?}", e))?;
    target
        .pages_mut()
        .copy_page_range_from_document(&source, first..=last, 0)
        .map_err(|e| format!("could not copy pages {}: {:?}", range, e))?;

    let bytes = target
        .save_to_bytes()
        .map_err(|e| format!("could not save extracted pages: {:?}", e))?;
    debug!("Extracted pages {} of {} → {} bytes", range, total, bytes.len());
    Ok(bytes)
}

/// Rasterise every page of `document`, longest edge capped at `max_pixels`.
pub fn render_pages_blocking(
    document: &[u8],
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<DynamicImage>, String> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, document, password)?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| format!("page {}: {:?}", idx + 1, e))?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push(image);
    }
    Ok(results)
}

/// Number of pages in `document`.
pub fn page_count_blocking(document: &[u8], password: Option<&str>) -> Result<usize, String> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, document, password)?;
    Ok(document.pages().len() as usize)
}

async fn run_blocking<T, F>(f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("pdfium task panicked: {}", e))?
}

/// Extracts page ranges with pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    password: Option<String>,
}

impl PdfiumExtractor {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }
}

#[async_trait]
impl RangeExtractor for PdfiumExtractor {
    async fn extract_range(
        &self,
        document: &[u8],
        range: PageRange,
    ) -> Result<Vec<u8>, StageError> {
        let bytes = document.to_vec();
        let password = self.password.clone();
        run_blocking(move || extract_range_blocking(&bytes, range, password.as_deref()))
            .await
            .map_err(StageError::extraction)
    }
}

/// Preview renderer for terminal use: loads the document and logs its size.
#[derive(Debug, Clone, Default)]
pub struct PageCountRenderer {
    password: Option<String>,
}

impl PageCountRenderer {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }
}

#[async_trait]
impl PreviewRenderer for PageCountRenderer {
    async fn render_preview(
        &self,
        document: &[u8],
        surface: PreviewSurface,
    ) -> Result<(), StageError> {
        let bytes = document.to_vec();
        let password = self.password.clone();
        let pages = run_blocking(move || page_count_blocking(&bytes, password.as_deref()))
            .await
            .map_err(StageError::render)?;
        info!("{} preview: {} pages", surface, pages);
        Ok(())
    }
}
