//! Shared pixel buffer.
//!
//! Workers write disjoint rectangles concurrently, so pixels are plain
//! relaxed atomics; the generation barrier orders them for readers.

use splitbrot_core::pixel::{count, is_dirty};
use splitbrot_core::{BigFloat, PixelRect, RecalcPolicy, ViewParams, DIRTY_BIT};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

pub struct Image {
    width: u32,
    height: u32,
    pixels: Box<[AtomicU32]>,
    pixels_computed: AtomicU64,
    pixels_iterated: AtomicU64,
}

impl Image {
    /// A fresh image; every pixel is dirty.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_words(width, height, |_, _| DIRTY_BIT)
    }

    fn from_words(width: u32, height: u32, mut word: impl FnMut(u32, u32) -> u32) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(AtomicU32::new(word(x, y)));
            }
        }
        Self {
            width,
            height,
            pixels: pixels.into_boxed_slice(),
            pixels_computed: AtomicU64::new(0),
            pixels_iterated: AtomicU64::new(0),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rect(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }

    /// The word at `(x, y)`, `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.get(x, y))
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.pixels[self.index(x, y)].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set(&self, x: u32, y: u32, word: u32) {
        self.pixels[self.index(x, y)].store(word, Ordering::Relaxed);
    }

    /// Row-major copy of every pixel word.
    pub fn snapshot(&self) -> Vec<u32> {
        self.pixels.iter().map(|p| p.load(Ordering::Relaxed)).collect()
    }

    /// Pixels written by jobs (computed or filled) since the last reset.
    pub fn pixels_computed(&self) -> u64 {
        self.pixels_computed.load(Ordering::Relaxed)
    }

    /// Pixels that actually ran an escape kernel since the last reset.
    pub fn pixels_iterated(&self) -> u64 {
        self.pixels_iterated.load(Ordering::Relaxed)
    }

    pub(crate) fn add_computed(&self, pixels: u64) {
        self.pixels_computed.fetch_add(pixels, Ordering::Relaxed);
    }

    pub(crate) fn add_iterated(&self, pixels: u64) {
        self.pixels_iterated.fetch_add(pixels, Ordering::Relaxed);
    }

    pub fn reset_counters(&self) {
        self.pixels_computed.store(0, Ordering::Relaxed);
        self.pixels_iterated.store(0, Ordering::Relaxed);
    }

    /// Marks every pixel stale, keeping its count as a preview.
    pub fn invalidate_all(&self) {
        for p in self.pixels.iter() {
            p.fetch_or(DIRTY_BIT, Ordering::Relaxed);
        }
    }

    /// After a cap decrease: counts at or above the new cap become the cap.
    pub fn clamp_to_cap(&self, cap: u32) {
        for p in self.pixels.iter() {
            let word = p.load(Ordering::Relaxed);
            if count(word) > cap {
                p.store((word & DIRTY_BIT) | cap, Ordering::Relaxed);
            }
        }
    }

    pub fn count_needing_recalc(&self, policy: &RecalcPolicy) -> u64 {
        self.pixels
            .iter()
            .filter(|p| policy.needs_recalc(p.load(Ordering::Relaxed)))
            .count() as u64
    }

    /// Sets the dirty bit on every pixel of `rect` the policy would
    /// recompute, so a later generation picks them up.
    pub fn mark_stale(&self, rect: PixelRect, policy: &RecalcPolicy) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                let p = &self.pixels[self.index(x, y)];
                let word = p.load(Ordering::Relaxed);
                if !is_dirty(word) && policy.needs_recalc(word) {
                    p.store(word | DIRTY_BIT, Ordering::Relaxed);
                }
            }
        }
    }

    /// The previous image reprojected into a new view, nearest neighbour,
    /// every pixel dirty. Pixels with no source become `DIRTY | 0`.
    pub fn rescaled_preview(&self, old: &ViewParams, new: &ViewParams) -> Image {
        let bits = old.precision.coordinate_bits().max(new.precision.coordinate_bits());
        let old_unity = (old.unity.0.to_precision(bits), old.unity.1.to_precision(bits));
        // (new center − old center) / old unity, and new unity / old unity,
        // in BigFloat so deep views do not underflow
        let shift = complex_div(
            (&new.center.0.sub(&old.center.0), &new.center.1.sub(&old.center.1)),
            (&old_unity.0, &old_unity.1),
        );
        let ratio = complex_div((&new.unity.0, &new.unity.1), (&old_unity.0, &old_unity.1));
        let (half_w, half_h) = ((self.width / 2) as f64, (self.height / 2) as f64);
        Image::from_words(self.width, self.height, |x, y| {
            let (ox, oy) = (x as f64 - half_w, y as f64 - half_h);
            // offset in old pixel units: shift + (ox + i·oy)·ratio
            let sx = shift.0 + ox * ratio.0 - oy * ratio.1 + half_w;
            let sy = shift.1 + ox * ratio.1 + oy * ratio.0 + half_h;
            let (sx, sy) = (sx.round(), sy.round());
            if sx >= 0.0 && sy >= 0.0 && sx < self.width as f64 && sy < self.height as f64 {
                self.get(sx as u32, sy as u32) | DIRTY_BIT
            } else {
                DIRTY_BIT
            }
        })
    }
}

fn complex_div(a: (&BigFloat, &BigFloat), b: (&BigFloat, &BigFloat)) -> (f64, f64) {
    let norm = b.0.mul(b.0).add(&b.1.mul(b.1));
    let re = a.0.mul(b.0).add(&a.1.mul(b.1)).div(&norm);
    let im = a.1.mul(b.0).sub(&a.0.mul(b.1)).div(&norm);
    (re.to_f64(), im.to_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_images_are_entirely_dirty() {
        let image = Image::new(4, 3);
        assert_eq!(image.snapshot(), vec![DIRTY_BIT; 12]);
    }

    #[test]
    fn invalidate_keeps_counts() {
        let image = Image::new(2, 1);
        image.set(0, 0, 7);
        image.set(1, 0, 9);
        image.invalidate_all();
        assert_eq!(image.snapshot(), vec![DIRTY_BIT | 7, DIRTY_BIT | 9]);
    }

    #[test]
    fn pixel_is_bounds_checked() {
        let image = Image::new(2, 3);
        image.set(1, 2, 5);
        assert_eq!(image.pixel(1, 2), Some(5));
        assert_eq!(image.pixel(2, 0), None);
        assert_eq!(image.pixel(0, 3), None);
    }

    #[test]
    fn clamp_lowers_counts_above_the_cap() {
        let image = Image::new(3, 1);
        image.set(0, 0, 10);
        image.set(1, 0, 64);
        image.set(2, 0, 100);
        image.clamp_to_cap(64);
        assert_eq!(image.snapshot(), vec![10, 64, 64]);
    }

    #[test]
    fn mark_stale_only_touches_recalc_candidates() {
        let image = Image::new(3, 1);
        image.set(0, 0, 10);
        image.set(1, 0, 64);
        image.set(2, 0, 64);
        let policy = RecalcPolicy::new(128, 64);
        image.mark_stale(PixelRect::new(0, 0, 2, 1), &policy);
        assert_eq!(image.snapshot(), vec![10, DIRTY_BIT | 64, 64]);
    }

    #[test]
    fn identical_views_preview_in_place() {
        let image = Image::new(8, 6);
        for y in 0..6 {
            for x in 0..8 {
                image.set(x, y, x + 10 * y);
            }
        }
        let view = ViewParams::from_f64(-0.5, 0.0, 0.01, 0.0).unwrap();
        let preview = image.rescaled_preview(&view, &view);
        for y in 0..6 {
            for x in 0..8 {
                assert_eq!(preview.get(x, y), DIRTY_BIT | (x + 10 * y));
            }
        }
    }

    #[test]
    fn panned_preview_shifts_and_blanks_the_edge() {
        let image = Image::new(8, 1);
        for x in 0..8 {
            image.set(x, 0, x + 1);
        }
        let old = ViewParams::from_f64(0.0, 0.0, 0.25, 0.0).unwrap();
        // two pixels to the right
        let new = ViewParams::from_f64(0.5, 0.0, 0.25, 0.0).unwrap();
        let preview = image.rescaled_preview(&old, &new);
        assert_eq!(preview.get(0, 0), DIRTY_BIT | 3);
        assert_eq!(preview.get(5, 0), DIRTY_BIT | 8);
        assert_eq!(preview.get(6, 0), DIRTY_BIT);
    }
}
