use pageflow_cache::ConfigError;
use pageflow_render::RenderError;
use std::io;
use thiserror::Error;

/// Failures that stop a [`Reader`](crate::Reader) from starting.
///
/// Everything that goes wrong after a successful open (render failures,
/// cache I/O, cancelled work) is recovered locally and shows up as page
/// state instead.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to open document: {0}")]
    DocumentOpen(#[source] RenderError),

    #[error("failed to start render workers: {0}")]
    WorkerSpawn(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ReaderResult<T> = Result<T, ReaderError>;
