//! PDF documents through PDFium
//!
//! Enabled with the `pdfium` feature. The PDFium library is bound once per
//! process; documents are reopened whenever the [`RendererGate`] reopens its
//! handle.
//!
//! [`RendererGate`]: crate::RendererGate

use crate::bitmap::{Bitmap, PixelRect};
use crate::error::{RenderError, RenderResult};
use crate::renderer::{DocumentHandle, DocumentSource};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static PDFIUM: OnceLock<Pdfium> = OnceLock::new();

/// Bind the PDFium library
///
/// Search order:
/// 1. Executable's directory (for app bundles: .app/Contents/MacOS/)
/// 2. Current working directory
/// 3. System library paths
fn pdfium() -> RenderResult<&'static Pdfium> {
    if let Some(pdfium) = PDFIUM.get() {
        return Ok(pdfium);
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()));

    let bundled = exe_dir.and_then(|dir| {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)).ok()
    });

    let bindings = match bundled {
        Some(bindings) => bindings,
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| RenderError::Open(format!("PDFium initialization error: {}", e)))?,
    };

    Ok(PDFIUM.get_or_init(|| Pdfium::new(bindings)))
}

/// A PDF file on disk
#[derive(Debug, Clone)]
pub struct PdfiumSource {
    path: PathBuf,
}

impl PdfiumSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSource for PdfiumSource {
    fn open(&self) -> RenderResult<Box<dyn DocumentHandle>> {
        let document = pdfium()?
            .load_pdf_from_file(&self.path, None)
            .map_err(|e| RenderError::Open(format!("{}: {}", self.path.display(), e)))?;
        Ok(Box::new(PdfiumHandle { document }))
    }
}

struct PdfiumHandle {
    document: PdfDocument<'static>,
}

// SAFETY: a handle is only ever reached through the RendererGate mutex, so
// PDFium never sees two threads inside one document at once.
unsafe impl Send for PdfiumHandle {}

impl PdfiumHandle {
    fn page(&self, index: usize) -> RenderResult<PdfPage<'_>> {
        let invalid = || RenderError::InvalidPageIndex {
            index,
            page_count: self.page_count(),
        };
        let index = u16::try_from(index).map_err(|_| invalid())?;
        self.document.pages().get(index).map_err(|_| invalid())
    }
}

impl DocumentHandle for PdfiumHandle {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_aspect_ratio(&mut self, index: usize) -> RenderResult<f32> {
        let page = self.page(index)?;
        let width = page.width().value;
        if width <= 0.0 {
            return Err(RenderError::Raster(format!("page {} has zero width", index)));
        }
        Ok(page.height().value / width)
    }

    fn render_page(&mut self, index: usize, width: u32, height: u32) -> RenderResult<Bitmap> {
        let page = self.page(index)?;

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        render(&page, &config)
    }

    fn render_region(
        &mut self,
        index: usize,
        page_width: u32,
        page_height: u32,
        region: PixelRect,
    ) -> RenderResult<Bitmap> {
        let page = self.page(index)?;
        let (width, height) = (region.width.max(1), region.height.max(1));

        // The page is first fitted to the region-sized target; the matrix
        // stretches it to `page_width x page_height` and moves the region to
        // the bitmap origin. Nothing outside the region is rasterized.
        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32)
            .transform(
                page_width as f32 / width as f32,
                0.0,
                0.0,
                page_height as f32 / height as f32,
                -(region.x as f32),
                -(region.y as f32),
            )
            .map_err(|e| RenderError::Raster(e.to_string()))?
            .clip(0, 0, width as i32, height as i32);

        render(&page, &config)
    }
}

fn render(page: &PdfPage<'_>, config: &PdfRenderConfig) -> RenderResult<Bitmap> {
    let rendered = page
        .render_with_config(config)
        .map_err(|e| RenderError::Raster(e.to_string()))?;

    let rgba = rendered.as_rgba_bytes().to_vec();
    Bitmap::from_rgba(rendered.width() as u32, rendered.height() as u32, rgba)
        .ok_or_else(|| RenderError::Raster("unexpected bitmap size".to_string()))
}
