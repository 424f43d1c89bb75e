//! Pixel to complex-plane mapping for one generation.

use splitbrot_core::{
    FixedComplex, FixedPoint, FixedPointError, Limb, LimbArith, PortableLimbs, Precision, ViewParams,
    LIMB_BITS,
};

/// Where each pixel of a `width × height` image lies, in the arithmetic
/// the view's precision calls for.
///
/// Every pixel is computed from the center and its integer offset, never
/// by accumulating steps across a row.
#[derive(Clone, Debug)]
pub enum PointMapping {
    Double {
        width: u32,
        height: u32,
        center: (f64, f64),
        unity: (f64, f64),
    },
    Fixed {
        width: u32,
        height: u32,
        center: FixedComplex,
        unity: FixedComplex,
    },
}

impl PointMapping {
    pub fn new(view: &ViewParams, width: u32, height: u32) -> Result<Self, FixedPointError> {
        Ok(match view.precision {
            Precision::Double => PointMapping::Double {
                width,
                height,
                center: (view.center.0.to_f64(), view.center.1.to_f64()),
                unity: (view.unity.0.to_f64(), view.unity.1.to_f64()),
            },
            Precision::Fixed { limbs } => PointMapping::Fixed {
                width,
                height,
                center: FixedComplex::new(
                    FixedPoint::from_bigfloat(&view.center.0, limbs)?,
                    FixedPoint::from_bigfloat(&view.center.1, limbs)?,
                ),
                unity: FixedComplex::new(
                    FixedPoint::from_bigfloat(&view.unity.0, limbs)?,
                    FixedPoint::from_bigfloat(&view.unity.1, limbs)?,
                ),
            },
        })
    }

    pub fn limb_count(&self) -> Option<usize> {
        match self {
            PointMapping::Double { .. } => None,
            PointMapping::Fixed { center, .. } => Some(center.limb_count()),
        }
    }

    fn offsets(&self, x: u32, y: u32) -> (i64, i64) {
        let (width, height) = match self {
            PointMapping::Double { width, height, .. } | PointMapping::Fixed { width, height, .. } => {
                (*width, *height)
            }
        };
        (x as i64 - (width / 2) as i64, y as i64 - (height / 2) as i64)
    }

    /// The pixel's point in doubles. Exact for the double mapping, an
    /// approximation for the fixed one.
    pub fn point_f64(&self, x: u32, y: u32) -> (f64, f64) {
        let (ox, oy) = self.offsets(x, y);
        let (ox, oy) = (ox as f64, oy as f64);
        match self {
            PointMapping::Double { center, unity, .. } => (
                center.0 + ox * unity.0 - oy * unity.1,
                center.1 + ox * unity.1 + oy * unity.0,
            ),
            PointMapping::Fixed { center, unity, .. } => {
                let (ur, ui) = (unity.re.to_f64(), unity.im.to_f64());
                (
                    center.re.to_f64() + ox * ur - oy * ui,
                    center.im.to_f64() + ox * ui + oy * ur,
                )
            }
        }
    }

    /// The pixel's point in fixed point, `None` when it falls outside
    /// `[-2, 2)` in either component (such points escape at once).
    pub fn point_fixed(&self, x: u32, y: u32) -> Option<FixedComplex> {
        let (ox, oy) = self.offsets(x, y);
        match self {
            PointMapping::Fixed { center, unity, .. } => {
                // re = cr + ox·ur − oy·ui, im = ci + ox·ui + oy·ur
                let re = affine(&center.re, &unity.re, ox, &unity.im, -oy)?;
                let im = affine(&center.im, &unity.im, ox, &unity.re, oy)?;
                Some(FixedComplex::new(re, im))
            }
            PointMapping::Double { .. } => None,
        }
    }
}

/// High limbs the affine sum carries beyond the coordinate width. Two
/// hold three terms of magnitude below `2^(64n + 64)` without wrapping.
const SPARE_LIMBS: usize = 2;

/// `base + a·ka + b·kb`, range-checked only once the sum is complete, so
/// large partial terms that cancel still give an in-range point.
fn affine(base: &FixedPoint, a: &FixedPoint, ka: i64, b: &FixedPoint, kb: i64) -> Option<FixedPoint> {
    let n = base.limb_count();
    let mut sum = widened(base, 1, n);
    for (term, factor) in [(a, ka), (b, kb)] {
        // two's complement, the carry out is meaningless
        let _ = PortableLimbs::add_assign(&mut sum, &widened(term, factor, n));
    }
    let negative = sum[0] >> (LIMB_BITS - 1) == 1;
    if negative {
        PortableLimbs::negate(&mut sum);
    }
    if sum[..SPARE_LIMBS].iter().any(|&limb| limb != 0) {
        return None;
    }
    let limbs = sum.split_off(SPARE_LIMBS);
    let negative = negative && !PortableLimbs::is_zero(&limbs);
    Some(FixedPoint::from_parts(negative, limbs))
}

/// `value·factor` in two's complement, `SPARE_LIMBS` wider than `value`.
fn widened(value: &FixedPoint, factor: i64, n: usize) -> Vec<Limb> {
    let f = factor.unsigned_abs() as u128;
    let mut wide = vec![0; n + SPARE_LIMBS];
    let mut carry: u128 = 0;
    for (dst, &limb) in wide.iter_mut().rev().zip(value.magnitude().iter().rev()) {
        let t = limb as u128 * f + carry;
        *dst = t as Limb;
        carry = t >> LIMB_BITS;
    }
    wide[SPARE_LIMBS - 1] = carry as Limb;
    if value.is_negative() != (factor < 0) {
        PortableLimbs::negate(&mut wide);
    }
    wide
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(precision: Precision) -> ViewParams {
        ViewParams::from_f64(-0.5, 0.25, 1.0 / 64.0, 0.0)
            .unwrap()
            .with_precision(precision)
    }

    #[test]
    fn center_pixel_maps_to_the_center() {
        let mapping = PointMapping::new(&view(Precision::Double), 100, 80).unwrap();
        assert_eq!(mapping.point_f64(50, 40), (-0.5, 0.25));
    }

    #[test]
    fn offsets_scale_by_unity() {
        let mapping = PointMapping::new(&view(Precision::Double), 100, 80).unwrap();
        assert_eq!(mapping.point_f64(0, 0), (-0.5 - 50.0 / 64.0, 0.25 - 40.0 / 64.0));
    }

    #[test]
    fn rotated_unity_turns_rows_into_diagonals() {
        let v = ViewParams::from_f64(0.0, 0.0, 0.5, 0.5).unwrap();
        let mapping = PointMapping::new(&v, 4, 4).unwrap();
        // one step right adds (0.5 + 0.5i), one step down adds i·(0.5 + 0.5i)
        assert_eq!(mapping.point_f64(3, 2), (0.5, 0.5));
        assert_eq!(mapping.point_f64(2, 3), (-0.5, 0.5));
    }

    #[test]
    fn fixed_and_double_agree_on_dyadic_grids() {
        let double = PointMapping::new(&view(Precision::Double), 64, 64).unwrap();
        let fixed = PointMapping::new(&view(Precision::Fixed { limbs: 2 }), 64, 64).unwrap();
        assert_eq!(fixed.limb_count(), Some(2));
        for (x, y) in [(0, 0), (63, 0), (17, 42), (32, 32)] {
            let point = fixed.point_fixed(x, y).unwrap();
            assert_eq!((point.re.to_f64(), point.im.to_f64()), double.point_f64(x, y));
        }
    }

    #[test]
    fn points_outside_the_fixed_range_are_rejected() {
        let v = ViewParams::from_f64(1.5, 0.0, 0.25, 0.0)
            .unwrap()
            .with_precision(Precision::Fixed { limbs: 2 });
        let mapping = PointMapping::new(&v, 8, 8).unwrap();
        assert!(mapping.point_fixed(7, 4).is_none());
        assert!(mapping.point_fixed(4, 4).is_some());
    }

    #[test]
    fn large_offsets_that_cancel_stay_in_range() {
        // 250 steps of 0.01 left of 1.5 reach -1.0, although 2.5 itself
        // does not fit the fixed range
        let v = ViewParams::from_f64(1.5, 0.0, 0.01, 0.0)
            .unwrap()
            .with_precision(Precision::Fixed { limbs: 2 });
        let fixed = PointMapping::new(&v, 500, 2).unwrap();
        let point = fixed.point_fixed(0, 1).unwrap();
        assert!((point.re.to_f64() + 1.0).abs() < 1e-12);
        assert!(point.im.is_zero());

        let double = PointMapping::new(&v.clone().with_precision(Precision::Double), 500, 2).unwrap();
        for x in [0, 1, 100, 250, 299] {
            let point = fixed.point_fixed(x, 0).unwrap();
            let (re, im) = double.point_f64(x, 0);
            assert!((point.re.to_f64() - re).abs() < 1e-12, "pixel {x}");
            assert!((point.im.to_f64() - im).abs() < 1e-12, "pixel {x}");
        }
    }

    #[test]
    fn negative_sums_keep_their_sign() {
        let v = ViewParams::from_f64(-1.5, 0.25, 0.125, 0.0)
            .unwrap()
            .with_precision(Precision::Fixed { limbs: 3 });
        let mapping = PointMapping::new(&v, 8, 8).unwrap();
        // (0, 0) is 4 steps left and up: -2.0 is outside, (1, 0) is -1.875
        assert!(mapping.point_fixed(0, 4).is_none());
        let point = mapping.point_fixed(1, 0).unwrap();
        assert_eq!((point.re.to_f64(), point.im.to_f64()), (-1.875, -0.25));
        let centered = mapping.point_fixed(4, 4).unwrap();
        assert_eq!((centered.re.to_f64(), centered.im.to_f64()), (-1.5, 0.25));
    }
}
