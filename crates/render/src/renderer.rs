//! Collaborator contracts between the viewer and a document rasterizer
//!
//! There are two layers. [`DocumentSource`] and [`DocumentHandle`] describe a
//! raw, non-thread-safe rasterizer handle (a pdfium document, for instance).
//! [`Renderer`] and [`PageInfoProvider`] are what the tile engine consumes;
//! [`GatedRenderer`](crate::GatedRenderer) implements both on top of a single
//! shared handle.

use crate::bitmap::{Bitmap, PixelRect};
use crate::error::RenderResult;
use pageflow_scheduler::{CancellationToken, FragmentRegion};

/// Rasterizes full pages and page fragments.
///
/// Both calls may block. They return [`RenderError::Cancelled`] as soon as
/// they notice `token` was cancelled.
///
/// [`RenderError::Cancelled`]: crate::RenderError::Cancelled
pub trait Renderer: Send + Sync {
    /// Render the whole page at `width x height` pixels.
    fn render_page(
        &self,
        index: usize,
        width: u32,
        height: u32,
        token: &CancellationToken,
    ) -> RenderResult<Bitmap>;

    /// Render `region` of a page laid out at `page_width x page_height`
    /// layout units, at `zoom` pixels per layout unit.
    ///
    /// The bitmap covers the region only. If the region at `zoom` would not
    /// fit the bitmap budget it comes back at a lower density.
    fn render_fragment(
        &self,
        index: usize,
        page_width: f32,
        page_height: f32,
        region: FragmentRegion,
        zoom: f32,
        token: &CancellationToken,
    ) -> RenderResult<Bitmap>;
}

/// Page metadata read once when a document is loaded.
pub trait PageInfo {
    fn page_count(&self) -> usize;

    /// Height divided by width of the page at `index`.
    fn aspect_ratio(&mut self, index: usize) -> RenderResult<f32>;
}

/// Opens a document for its page metadata.
pub trait PageInfoProvider: Send + Sync {
    fn open(&self) -> RenderResult<Box<dyn PageInfo + '_>>;
}

/// An open rasterizer handle. Not required to be thread safe; callers
/// serialize access.
pub trait DocumentHandle: Send {
    fn page_count(&self) -> usize;

    fn page_aspect_ratio(&mut self, index: usize) -> RenderResult<f32>;

    fn render_page(&mut self, index: usize, width: u32, height: u32) -> RenderResult<Bitmap>;

    /// Render `region` of the page as if the whole page were rasterized at
    /// `page_width x page_height` pixels. Only `region` is allocated, so the
    /// page size may be well past the bitmap budget.
    fn render_region(
        &mut self,
        index: usize,
        page_width: u32,
        page_height: u32,
        region: PixelRect,
    ) -> RenderResult<Bitmap>;
}

/// Opens [`DocumentHandle`]s on demand.
pub trait DocumentSource: Send + Sync {
    fn open(&self) -> RenderResult<Box<dyn DocumentHandle>>;
}
