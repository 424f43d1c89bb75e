use splitbrot_core::{FixedPointError, ViewError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a generation is already running")]
    AlreadyRunning,

    #[error("image size {0}x{1} has no pixels")]
    EmptyImage(u32, u32),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    FixedPoint(#[from] FixedPointError),

    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
