//! Pixel word layout and the recompute rule.
//!
//! Bits 0..30 hold the escape count (or the cap for points that never
//! escaped); bit 31 marks the pixel stale.

/// Set on pixels whose stored count must not be trusted.
pub const DIRTY_BIT: u32 = 0x8000_0000;

/// Mask selecting the iteration count.
pub const COUNT_MASK: u32 = 0x7FFF_FFFF;

#[inline]
pub fn count(word: u32) -> u32 {
    word & COUNT_MASK
}

#[inline]
pub fn is_dirty(word: u32) -> bool {
    word & DIRTY_BIT != 0
}

/// Decides which pixels a generation has to (re)compute.
///
/// `recalc_limit == 0` means only dirty pixels are recomputed. Otherwise
/// it is the cap the image was last computed with, and a raised cap also
/// selects every pixel that sat at that old cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecalcPolicy {
    pub max_iter: u32,
    pub recalc_limit: u32,
}

impl RecalcPolicy {
    pub fn new(max_iter: u32, recalc_limit: u32) -> Self {
        Self {
            max_iter,
            recalc_limit,
        }
    }

    #[inline]
    pub fn needs_recalc(&self, word: u32) -> bool {
        is_dirty(word)
            || (self.recalc_limit > 0
                && self.max_iter > self.recalc_limit
                && count(word) >= self.recalc_limit)
    }
}
