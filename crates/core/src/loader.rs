//! Document loading: page boundaries from the cache or the document
//!
//! Laying out a document needs the aspect ratio of every page. Reading them
//! means opening the document and visiting each page, which is slow for
//! large files, so they are persisted in the page cache and read back from
//! there on the next open.

use pageflow_cache::TileCache;
use pageflow_render::{PageInfoProvider, RenderError, RenderResult};
use tracing::{debug, warn};
use viewer_core::PageDescriptor;

/// Progress of reading page boundaries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadingState {
    /// Fraction of pages read so far, in `[0, 1]`
    Loading(f32),
    Ready,
}

impl LoadingState {
    pub fn progress(&self) -> f32 {
        match self {
            LoadingState::Loading(progress) => *progress,
            LoadingState::Ready => 1.0,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LoadingState::Ready)
    }
}

/// Reads the page descriptors of one document.
///
/// # Example
///
/// ```
/// use pageflow_core::{DocumentLoader, LoadingState};
/// use pageflow_render::{GatedRenderer, SyntheticDocument};
///
/// let renderer = GatedRenderer::new(SyntheticDocument::uniform(3, 1.5));
/// let mut seen = Vec::new();
/// let pages = DocumentLoader::new(&renderer)
///     .with_progress(|state| seen.push(state))
///     .load()
///     .unwrap();
///
/// assert_eq!(pages.len(), 3);
/// assert_eq!(seen.last(), Some(&LoadingState::Ready));
/// ```
pub struct DocumentLoader<'a> {
    provider: &'a dyn PageInfoProvider,
    cache: Option<&'a dyn TileCache>,
    on_progress: Option<Box<dyn FnMut(LoadingState) + 'a>>,
}

impl<'a> DocumentLoader<'a> {
    pub fn new(provider: &'a dyn PageInfoProvider) -> Self {
        Self {
            provider,
            cache: None,
            on_progress: None,
        }
    }

    /// Try cached boundaries first and persist freshly read ones.
    pub fn with_cache(mut self, cache: &'a dyn TileCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_progress(mut self, on_progress: impl FnMut(LoadingState) + 'a) -> Self {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Read every page's aspect ratio.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be opened or a page cannot be read.
    /// Cache failures are logged and otherwise ignored.
    pub fn load(mut self) -> RenderResult<Vec<PageDescriptor>> {
        if let Some(aspect_ratios) = self.cached_boundaries() {
            debug!(pages = aspect_ratios.len(), "page boundaries loaded from cache");
            self.report(LoadingState::Ready);
            return Ok(descriptors(&aspect_ratios));
        }

        let aspect_ratios = self.read_boundaries()?;

        if let Some(cache) = self.cache {
            if let Err(err) = cache.save_boundaries(&aspect_ratios) {
                warn!(error = %err, "failed to persist page boundaries");
            }
        }

        self.report(LoadingState::Ready);
        Ok(descriptors(&aspect_ratios))
    }

    fn cached_boundaries(&self) -> Option<Vec<f32>> {
        let cache = self.cache?;
        match cache.load_boundaries() {
            Ok(Some(ratios)) if !ratios.is_empty() && ratios.iter().all(|r| valid_ratio(*r)) => {
                Some(ratios)
            }
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "failed to read cached page boundaries");
                None
            }
        }
    }

    fn read_boundaries(&mut self) -> RenderResult<Vec<f32>> {
        let mut info = self.provider.open()?;
        let page_count = info.page_count();
        self.report(LoadingState::Loading(0.0));

        let mut aspect_ratios = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let ratio = info.aspect_ratio(index)?;
            if !valid_ratio(ratio) {
                return Err(RenderError::Open(format!(
                    "page {} has invalid aspect ratio {}",
                    index, ratio
                )));
            }
            aspect_ratios.push(ratio);
            self.report(LoadingState::Loading((index + 1) as f32 / page_count as f32));
        }

        debug!(pages = page_count, "page boundaries read from document");
        Ok(aspect_ratios)
    }

    fn report(&mut self, state: LoadingState) {
        if let Some(on_progress) = self.on_progress.as_mut() {
            on_progress(state);
        }
    }
}

fn valid_ratio(ratio: f32) -> bool {
    ratio.is_finite() && ratio > 0.0
}

fn descriptors(aspect_ratios: &[f32]) -> Vec<PageDescriptor> {
    aspect_ratios
        .iter()
        .enumerate()
        .map(|(index, ratio)| PageDescriptor::new(index, *ratio))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageflow_cache::RamTileCache;
    use pageflow_render::{GatedRenderer, PageInfo, SyntheticDocument};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often the document is opened
    struct CountingProvider {
        inner: GatedRenderer,
        opens: AtomicUsize,
    }

    impl CountingProvider {
        fn new(aspect_ratios: Vec<f32>) -> Self {
            Self {
                inner: GatedRenderer::new(SyntheticDocument::new(aspect_ratios)),
                opens: AtomicUsize::new(0),
            }
        }
    }

    impl PageInfoProvider for CountingProvider {
        fn open(&self) -> RenderResult<Box<dyn PageInfo + '_>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.inner.open()
        }
    }

    #[test]
    fn test_reports_progress_per_page() {
        let provider = CountingProvider::new(vec![1.0, 1.5, 2.0, 0.5]);
        let mut seen = Vec::new();

        let pages = DocumentLoader::new(&provider)
            .with_progress(|state| seen.push(state))
            .load()
            .unwrap();

        assert_eq!(pages.len(), 4);
        assert_eq!(pages[2], PageDescriptor::new(2, 2.0));
        assert_eq!(
            seen,
            vec![
                LoadingState::Loading(0.0),
                LoadingState::Loading(0.25),
                LoadingState::Loading(0.5),
                LoadingState::Loading(0.75),
                LoadingState::Loading(1.0),
                LoadingState::Ready,
            ]
        );
    }

    #[test]
    fn test_boundaries_are_persisted() {
        let provider = CountingProvider::new(vec![1.25, 0.75]);
        let cache = RamTileCache::with_mb_limit(1);

        DocumentLoader::new(&provider).with_cache(&cache).load().unwrap();

        assert_eq!(cache.load_boundaries().unwrap(), Some(vec![1.25, 0.75]));
    }

    #[test]
    fn test_cached_boundaries_skip_the_document() {
        let provider = CountingProvider::new(vec![1.0; 3]);
        let cache = RamTileCache::with_mb_limit(1);
        cache.save_boundaries(&[2.0, 3.0]).unwrap();

        let mut seen = Vec::new();
        let pages = DocumentLoader::new(&provider)
            .with_cache(&cache)
            .with_progress(|state| seen.push(state))
            .load()
            .unwrap();

        assert_eq!(provider.opens.load(Ordering::SeqCst), 0);
        assert_eq!(pages, vec![PageDescriptor::new(0, 2.0), PageDescriptor::new(1, 3.0)]);
        assert_eq!(seen, vec![LoadingState::Ready]);
    }

    #[test]
    fn test_invalid_ratio_fails_the_load() {
        let provider = CountingProvider::new(vec![1.0, 0.0]);
        let err = DocumentLoader::new(&provider).load().unwrap_err();
        assert!(matches!(err, RenderError::Open(_)));
    }

    #[test]
    fn test_loading_state_progress() {
        assert_eq!(LoadingState::Loading(0.4).progress(), 0.4);
        assert_eq!(LoadingState::Ready.progress(), 1.0);
        assert!(!LoadingState::Loading(1.0).is_ready());
    }
}
