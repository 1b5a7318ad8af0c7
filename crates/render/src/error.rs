use thiserror::Error;

/// Errors that can occur while opening or rasterizing a document
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// The render was superseded or the page went out of range.
    /// Callers treat this as "no result", never as a failure.
    #[error("render cancelled")]
    Cancelled,

    #[error("invalid page index {index} (document has {page_count} pages)")]
    InvalidPageIndex { index: usize, page_count: usize },

    /// Failed to open the document
    #[error("document open error: {0}")]
    Open(String),

    /// The rasterizer reported an error
    #[error("raster error: {0}")]
    Raster(String),
}

impl RenderError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RenderError::Cancelled)
    }
}

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;
