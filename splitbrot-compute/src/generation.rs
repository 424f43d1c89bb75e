//! State shared by every job of one run.

use crate::cancellation::{CancellationChecker, TerminateFlag};
use crate::image::Image;
use crate::mapping::PointMapping;
use splitbrot_core::{EngineConfig, RecalcPolicy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Size thresholds steering the decomposition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitLimits {
    pub full_compute_below: u32,
    pub min_bisect_size: u32,
}

impl From<&EngineConfig> for SplitLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            full_compute_below: config.full_compute_below,
            min_bisect_size: config.min_bisect_size.max(5),
        }
    }
}

impl Default for SplitLimits {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// One generation: the image being written, how pixels map to the
/// plane, which pixels to recompute and the flag that stops it all.
///
/// Jobs hold an `Arc` to their generation; the last job to finish drops
/// the last scheduler-side reference.
pub struct Generation {
    image: Arc<Image>,
    mapping: PointMapping,
    policy: RecalcPolicy,
    limits: SplitLimits,
    terminate: TerminateFlag,
    priority: AtomicU64,
}

impl Generation {
    pub fn new(
        image: Arc<Image>,
        mapping: PointMapping,
        policy: RecalcPolicy,
        limits: SplitLimits,
        priority: (i32, i32),
    ) -> Self {
        Self {
            image,
            mapping,
            policy,
            limits,
            terminate: TerminateFlag::new(),
            priority: AtomicU64::new(pack(priority)),
        }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn mapping(&self) -> &PointMapping {
        &self.mapping
    }

    pub fn policy(&self) -> RecalcPolicy {
        self.policy
    }

    pub fn max_iter(&self) -> u32 {
        self.policy.max_iter
    }

    pub fn limits(&self) -> SplitLimits {
        self.limits
    }

    pub fn terminate_flag(&self) -> &TerminateFlag {
        &self.terminate
    }

    pub fn is_terminating(&self) -> bool {
        self.terminate.is_cancelled()
    }

    /// The screen point whose neighbourhood is computed first.
    pub fn priority_point(&self) -> (i32, i32) {
        unpack(self.priority.load(Ordering::Relaxed))
    }

    pub fn set_priority_point(&self, x: i32, y: i32) {
        self.priority.store(pack((x, y)), Ordering::Relaxed);
    }
}

fn pack((x, y): (i32, i32)) -> u64 {
    ((x as u32 as u64) << 32) | y as u32 as u64
}

fn unpack(word: u64) -> (i32, i32) {
    ((word >> 32) as u32 as i32, word as u32 as i32)
}
