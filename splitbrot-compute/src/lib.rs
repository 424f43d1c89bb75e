pub mod cancellation;
pub mod decompose;
pub mod engine;
pub mod error;
mod fatal;
pub mod fixed_mandelbrot;
pub mod generation;
pub mod image;
pub mod job;
pub mod kernel;
pub mod mandelbrot;
pub mod mapping;
pub mod pool;
pub mod scheduler;
pub mod semaphore;
mod simd;

pub use cancellation::{CancellationChecker, NeverCancel, TerminateFlag};
pub use engine::{Engine, Updates};
pub use error::EngineError;
pub use fixed_mandelbrot::FixedEscape;
pub use generation::{Generation, SplitLimits};
pub use image::Image;
pub use job::{PresentSource, Presented};
pub use mandelbrot::{escape_batch, escape_time, LANES};
pub use mapping::PointMapping;
pub use scheduler::Scheduler;

// Re-export core types for convenience
pub use splitbrot_core::*;
