//! Rasterized page bitmaps
//!
//! A [`Bitmap`] is plain RGBA pixel data (4 bytes per pixel, row major, no
//! padding). Full pages and fragments use the same type; only their size and
//! placement differ.

use std::fmt;

/// Largest bitmap a render is allowed to allocate (100 MiB of RGBA).
pub const MAX_BITMAP_BYTES: u64 = 100 * 1024 * 1024;

/// Bytes per RGBA pixel.
pub const BYTES_PER_PIXEL: u64 = 4;

/// Pixel-space rectangle inside a rendered page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Rendered RGBA pixel data
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Pixel data in RGBA format
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Wrap existing RGBA data
    ///
    /// Returns `None` if `pixels` does not hold exactly `width * height` pixels.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as u64 * height as u64 * BYTES_PER_PIXEL;
        (pixels.len() as u64 == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A bitmap filled with a single RGBA color
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Size of the pixel data in bytes
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// RGBA value at `(x, y)`, if inside the bitmap
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Scale factor (≤ 1) that keeps a `width x height` RGBA bitmap under
/// [`MAX_BITMAP_BYTES`].
pub fn budget_scale(width: u32, height: u32) -> f32 {
    let bytes = width as u64 * height as u64 * BYTES_PER_PIXEL;
    if bytes <= MAX_BITMAP_BYTES {
        return 1.0;
    }
    (MAX_BITMAP_BYTES as f64 / bytes as f64).sqrt() as f32
}

/// Proportionally shrink a target size until it fits the bitmap budget.
pub fn fit_to_budget(width: u32, height: u32) -> (u32, u32) {
    let scale = budget_scale(width, height);
    if scale >= 1.0 {
        return (width, height);
    }
    (
        ((width as f32 * scale).floor() as u32).max(1),
        ((height as f32 * scale).floor() as u32).max(1),
    )
}
