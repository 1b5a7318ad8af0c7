//! Pageflow Render Library
//!
//! Bitmaps, rasterizer contracts and the shared document gate.
//!
//! The tile engine talks to a [`Renderer`] and a [`PageInfoProvider`].
//! [`GatedRenderer`] implements both over any [`DocumentSource`], serializing
//! every call through a reference-counted [`RendererGate`] so one open
//! document handle is shared by all pages. Enable the `pdfium` feature for a
//! PDF backend.

mod bitmap;
mod error;
mod gate;
mod gated;
#[cfg(feature = "pdfium")]
mod pdfium;
mod renderer;
mod synthetic;

pub use bitmap::{
    budget_scale, fit_to_budget, Bitmap, PixelRect, BYTES_PER_PIXEL, MAX_BITMAP_BYTES,
};
pub use error::{RenderError, RenderResult};
pub use gate::{GateHold, RendererGate};
pub use gated::GatedRenderer;
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumSource;
pub use renderer::{DocumentHandle, DocumentSource, PageInfo, PageInfoProvider, Renderer};
pub use synthetic::SyntheticDocument;
