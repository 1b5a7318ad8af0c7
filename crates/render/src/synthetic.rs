//! In-memory document for tests and demos
//!
//! Pages have fixed aspect ratios and render as a flat color derived from
//! the page index, so output can be checked without a real rasterizer.

use crate::bitmap::{Bitmap, PixelRect};
use crate::error::{RenderError, RenderResult};
use crate::renderer::{DocumentHandle, DocumentSource};

#[derive(Debug, Clone)]
pub struct SyntheticDocument {
    aspect_ratios: Vec<f32>,
}

impl SyntheticDocument {
    pub fn new(aspect_ratios: Vec<f32>) -> Self {
        Self { aspect_ratios }
    }

    /// `count` pages sharing one aspect ratio
    pub fn uniform(count: usize, aspect_ratio: f32) -> Self {
        Self::new(vec![aspect_ratio; count])
    }

    /// The fill color of page `index`
    pub fn page_color(index: usize) -> [u8; 4] {
        let seed = (index as u32).wrapping_mul(2_654_435_761);
        [(seed >> 24) as u8, (seed >> 16) as u8, (seed >> 8) as u8, 255]
    }
}

impl DocumentSource for SyntheticDocument {
    fn open(&self) -> RenderResult<Box<dyn DocumentHandle>> {
        Ok(Box::new(SyntheticHandle {
            aspect_ratios: self.aspect_ratios.clone(),
        }))
    }
}

struct SyntheticHandle {
    aspect_ratios: Vec<f32>,
}

impl SyntheticHandle {
    fn check_index(&self, index: usize) -> RenderResult<()> {
        if index < self.aspect_ratios.len() {
            Ok(())
        } else {
            Err(RenderError::InvalidPageIndex {
                index,
                page_count: self.aspect_ratios.len(),
            })
        }
    }
}

impl DocumentHandle for SyntheticHandle {
    fn page_count(&self) -> usize {
        self.aspect_ratios.len()
    }

    fn page_aspect_ratio(&mut self, index: usize) -> RenderResult<f32> {
        self.check_index(index)?;
        Ok(self.aspect_ratios[index])
    }

    fn render_page(&mut self, index: usize, width: u32, height: u32) -> RenderResult<Bitmap> {
        self.check_index(index)?;
        Ok(Bitmap::filled(width, height, SyntheticDocument::page_color(index)))
    }

    fn render_region(
        &mut self,
        index: usize,
        _page_width: u32,
        _page_height: u32,
        region: PixelRect,
    ) -> RenderResult<Bitmap> {
        self.check_index(index)?;
        Ok(Bitmap::filled(
            region.width,
            region.height,
            SyntheticDocument::page_color(index),
        ))
    }
}
