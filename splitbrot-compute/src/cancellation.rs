use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Trait for checking if computation should be cancelled
pub trait CancellationChecker: Clone {
    /// Returns true if computation should be cancelled
    fn is_cancelled(&self) -> bool;
}

/// Never cancels - for single-threaded or non-cancellable contexts
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancellationChecker for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Counting terminate flag shared by every job of a generation.
///
/// Each pending cancel holds one raise; the flag reads as set while any
/// raise is outstanding.
#[derive(Clone, Debug, Default)]
pub struct TerminateFlag {
    raised: Arc<AtomicU32>,
}

impl TerminateFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.fetch_add(1, Ordering::SeqCst);
    }

    pub fn lower(&self) {
        let previous = self.raised.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "terminate flag lowered more often than raised");
    }
}

impl CancellationChecker for TerminateFlag {
    fn is_cancelled(&self) -> bool {
        self.raised.load(Ordering::Acquire) > 0
    }
}
