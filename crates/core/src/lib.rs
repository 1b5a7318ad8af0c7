//! Pageflow Core Library
//!
//! Tile engine and reader facade for a paginated document viewport.
//!
//! [`Reader`] is the entry point for a UI layer: it loads page boundaries
//! (from the page cache when possible), owns the viewport state machine from
//! `viewer-core` and a [`TileEngine`] that renders full pages and zoomed
//! fragments on a worker pool, debounced and cancellable.
//!
//! # Example
//!
//! ```
//! use pageflow_core::{PageStatus, Reader, ReaderConfig};
//! use pageflow_render::{GatedRenderer, SyntheticDocument};
//! use std::time::{Duration, Instant};
//! use viewer_core::Size;
//!
//! let renderer = GatedRenderer::new(SyntheticDocument::uniform(4, 1.4));
//! let mut reader = Reader::open(renderer, ReaderConfig::new().with_worker_threads(1)).unwrap();
//! reader.on_viewport_resize(Size::new(200.0, 300.0));
//!
//! let deadline = Instant::now() + Duration::from_secs(5);
//! while reader.page(0).map(|page| page.status()) != Some(PageStatus::Ready)
//!     && Instant::now() < deadline
//! {
//!     reader.tick();
//!     std::thread::sleep(Duration::from_millis(2));
//! }
//! assert_eq!(reader.page(0).unwrap().full_bitmap().unwrap().width, 200);
//! reader.dispose();
//! ```

mod config;
mod engine;
mod error;
mod loader;
mod page;
mod reader;

pub use config::ReaderConfig;
pub use engine::{page_demands, EngineConfig, TileEngine};
pub use error::{ReaderError, ReaderResult};
pub use loader::{DocumentLoader, LoadingState};
pub use page::{Fragment, FragmentDemand, PageDemand, PageRuntime, PageStatus};
pub use reader::{Reader, ReaderBuilder};

pub use pageflow_cache::ConfigError;
