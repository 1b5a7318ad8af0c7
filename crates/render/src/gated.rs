//! [`Renderer`] and [`PageInfoProvider`] over a shared [`RendererGate`]

use crate::bitmap::{budget_scale, fit_to_budget, Bitmap, PixelRect};
use crate::error::{RenderError, RenderResult};
use crate::gate::{GateHold, RendererGate};
use crate::renderer::{DocumentHandle, DocumentSource, PageInfo, PageInfoProvider, Renderer};
use pageflow_scheduler::{CancellationToken, FragmentRegion};
use std::sync::Arc;

/// Renderer that funnels every call through one [`RendererGate`]
///
/// Cancellation is checked before waiting on the gate, once the gate is
/// acquired (before the target bitmap is allocated), and after the raster
/// call, so a cancelled render never hands back a bitmap.
#[derive(Debug, Clone)]
pub struct GatedRenderer {
    gate: Arc<RendererGate>,
}

impl GatedRenderer {
    pub fn new(source: impl DocumentSource + 'static) -> Self {
        Self::from_gate(Arc::new(RendererGate::new(source)))
    }

    pub fn from_gate(gate: Arc<RendererGate>) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &Arc<RendererGate> {
        &self.gate
    }

    fn run<R>(
        &self,
        index: usize,
        token: &CancellationToken,
        f: impl FnOnce(&mut dyn DocumentHandle) -> RenderResult<R>,
    ) -> RenderResult<R> {
        check(token)?;
        let hold = self.gate.hold();
        let result = self.gate.with_handle(&hold, |handle| {
            check(token)?;
            check_index(handle, index)?;
            f(handle)
        })?;
        check(token)?;
        Ok(result)
    }
}

impl Renderer for GatedRenderer {
    fn render_page(
        &self,
        index: usize,
        width: u32,
        height: u32,
        token: &CancellationToken,
    ) -> RenderResult<Bitmap> {
        let (width, height) = fit_to_budget(width.max(1), height.max(1));
        tracing::trace!(page = index, width, height, "rendering page");
        self.run(index, token, |handle| handle.render_page(index, width, height))
    }

    fn render_fragment(
        &self,
        index: usize,
        page_width: f32,
        page_height: f32,
        region: FragmentRegion,
        zoom: f32,
        token: &CancellationToken,
    ) -> RenderResult<Bitmap> {
        if page_width <= 0.0 || page_height <= 0.0 || zoom <= 0.0 {
            return Err(RenderError::Raster(format!(
                "empty fragment target {}x{} at zoom {}",
                page_width, page_height, zoom
            )));
        }

        // Only the region is rasterized, so the budget applies to its own
        // pixel size; the page around it is never allocated
        let density = fragment_density(region, zoom);
        let full_width = (page_width * density).round().max(1.0) as u32;
        let full_height = (page_height * density).round().max(1.0) as u32;
        let rect = region_to_pixels(region, page_width, page_height, full_width, full_height);

        tracing::trace!(
            page = index,
            zoom = density,
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            "rendering fragment"
        );
        self.run(index, token, |handle| {
            handle.render_region(index, full_width, full_height, rect)
        })
    }
}

impl PageInfoProvider for GatedRenderer {
    fn open(&self) -> RenderResult<Box<dyn PageInfo + '_>> {
        let hold = self.gate.hold();
        let page_count = self.gate.with_handle(&hold, |handle| Ok(handle.page_count()))?;
        Ok(Box::new(GatedPageInfo {
            gate: &self.gate,
            hold,
            page_count,
        }))
    }
}

/// Keeps the handle open while page metadata is read
struct GatedPageInfo<'a> {
    gate: &'a RendererGate,
    hold: GateHold<'a>,
    page_count: usize,
}

impl PageInfo for GatedPageInfo<'_> {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn aspect_ratio(&mut self, index: usize) -> RenderResult<f32> {
        self.gate.with_handle(&self.hold, |handle| {
            check_index(handle, index)?;
            handle.page_aspect_ratio(index)
        })
    }
}

fn check(token: &CancellationToken) -> RenderResult<()> {
    if token.is_cancelled() {
        Err(RenderError::Cancelled)
    } else {
        Ok(())
    }
}

fn check_index(handle: &dyn DocumentHandle, index: usize) -> RenderResult<()> {
    let page_count = handle.page_count();
    if index >= page_count {
        return Err(RenderError::InvalidPageIndex { index, page_count });
    }
    Ok(())
}

/// Pixels per layout unit a fragment is rendered at: `zoom`, unless the
/// region at that zoom would exceed the bitmap budget.
fn fragment_density(region: FragmentRegion, zoom: f32) -> f32 {
    let width = (region.width() * zoom).ceil().max(1.0) as u32;
    let height = (region.height() * zoom).ceil().max(1.0) as u32;
    zoom * budget_scale(width, height)
}

/// Map a page-local region in layout units onto a page rasterized at
/// `full_width x full_height` pixels. The result always covers the region
/// and stays inside the page.
fn region_to_pixels(
    region: FragmentRegion,
    page_width: f32,
    page_height: f32,
    full_width: u32,
    full_height: u32,
) -> PixelRect {
    let sx = full_width as f32 / page_width;
    let sy = full_height as f32 / page_height;

    let left = ((region.left * sx).floor().max(0.0) as u32).min(full_width - 1);
    let top = ((region.top * sy).floor().max(0.0) as u32).min(full_height - 1);
    let right = ((region.right * sx).ceil().max(0.0) as u32).clamp(left + 1, full_width);
    let bottom = ((region.bottom * sy).ceil().max(0.0) as u32).clamp(top + 1, full_height);

    PixelRect::new(left, top, right - left, bottom - top)
}
