//! Per-job pixel evaluation.
//!
//! Picks the double lane kernel or the fixed-point kernel from the
//! generation's mapping and owns the scratch space the latter needs.

use crate::cancellation::CancellationChecker;
use crate::fixed_mandelbrot::FixedEscape;
use crate::mandelbrot::{escape_batch, LANES};
use crate::mapping::PointMapping;

pub struct PixelKernel<'a> {
    mapping: &'a PointMapping,
    max_iter: u32,
    fixed: Option<FixedEscape>,
}

impl<'a> PixelKernel<'a> {
    pub fn new(mapping: &'a PointMapping, max_iter: u32) -> Self {
        Self {
            mapping,
            max_iter,
            fixed: mapping.limb_count().map(FixedEscape::new),
        }
    }

    /// Pixels handled per call to [`Self::evaluate`].
    pub fn batch_size(&self) -> usize {
        if self.fixed.is_some() {
            1
        } else {
            LANES
        }
    }

    /// Writes the escape counts of up to `batch_size()` pixels to `out`.
    /// Returns false when cancelled before every count was produced.
    pub fn evaluate(
        &mut self,
        pixels: &[(u32, u32)],
        out: &mut [u32],
        cancel: &impl CancellationChecker,
    ) -> bool {
        debug_assert!(pixels.len() <= self.batch_size());
        match &mut self.fixed {
            Some(fixed) => {
                for (&(x, y), count) in pixels.iter().zip(out.iter_mut()) {
                    *count = match self.mapping.point_fixed(x, y) {
                        Some(c) => match fixed.escape_time(&c, self.max_iter, cancel) {
                            Some(n) => n,
                            None => return false,
                        },
                        None => 1.min(self.max_iter),
                    };
                }
                true
            }
            None => {
                let Some(&(x0, y0)) = pixels.first() else {
                    return true;
                };
                // spare lanes repeat the first pixel so they cost nothing extra
                let first = self.mapping.point_f64(x0, y0);
                let mut cr = [first.0; LANES];
                let mut ci = [first.1; LANES];
                for (lane, &(x, y)) in pixels.iter().enumerate().skip(1) {
                    (cr[lane], ci[lane]) = self.mapping.point_f64(x, y);
                }
                let counts = escape_batch(&cr, &ci, self.max_iter);
                out[..pixels.len()].copy_from_slice(&counts[..pixels.len()]);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::NeverCancel;
    use crate::mandelbrot::escape_time;
    use splitbrot_core::{Precision, ViewParams};

    #[test]
    fn double_batches_match_single_points() {
        let view = ViewParams::from_f64(-0.75, 0.0, 1.0 / 16.0, 0.0).unwrap();
        let mapping = PointMapping::new(&view, 32, 32).unwrap();
        let mut kernel = PixelKernel::new(&mapping, 200);
        let pixels: Vec<(u32, u32)> = (0..kernel.batch_size() as u32).map(|x| (x * 3, 5)).collect();
        let mut out = vec![0; pixels.len()];
        assert!(kernel.evaluate(&pixels, &mut out, &NeverCancel));
        for (&(x, y), &count) in pixels.iter().zip(&out) {
            let (re, im) = mapping.point_f64(x, y);
            assert_eq!(count, escape_time(re, im, 200));
        }
    }

    #[test]
    fn fixed_kernel_handles_points_off_the_plane() {
        let view = ViewParams::from_f64(1.5, 0.0, 0.25, 0.0)
            .unwrap()
            .with_precision(Precision::Fixed { limbs: 2 });
        let mapping = PointMapping::new(&view, 8, 8).unwrap();
        let mut kernel = PixelKernel::new(&mapping, 50);
        assert_eq!(kernel.batch_size(), 1);
        let mut out = [0];
        assert!(kernel.evaluate(&[(7, 4)], &mut out, &NeverCancel));
        assert_eq!(out, [1]);
    }
}
