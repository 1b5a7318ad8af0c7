use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewportError {
    #[error("page {index} is out of range (document has {page_count} pages)")]
    InvalidPageIndex { index: usize, page_count: usize },
}
