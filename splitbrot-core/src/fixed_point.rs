//! Signed fixed-point coordinates in `[-2, 2)`.
//!
//! A value with `n` limbs is `±M / 2^(64n - 1)` where `M` is the limb
//! magnitude, so the top bit of the first limb is the integer bit.

use crate::bigfloat::BigFloat;
use crate::limbs::{Limb, LimbArith, PortableLimbs, LIMB_BITS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum FixedPointError {
    #[error("value {0} is outside the fixed-point range [-2, 2)")]
    OutOfRange(String),
    #[error("non-finite value cannot be converted to fixed point")]
    NotFinite,
    #[error("fixed point needs at least one limb")]
    NoLimbs,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPoint {
    negative: bool,
    limbs: Vec<Limb>,
}

impl FixedPoint {
    pub fn zero(limb_count: usize) -> Self {
        Self {
            negative: false,
            limbs: vec![0; limb_count],
        }
    }

    /// Builds a value from a raw magnitude. `limbs` must be non-empty.
    pub fn from_parts(negative: bool, limbs: Vec<Limb>) -> Self {
        debug_assert!(!limbs.is_empty());
        Self { negative, limbs }
    }

    /// Converts a double, exactly when the double has no bits below the
    /// last limb, otherwise rounding the tail half-up.
    pub fn from_f64(value: f64, limb_count: usize) -> Result<Self, FixedPointError> {
        if limb_count == 0 {
            return Err(FixedPointError::NoLimbs);
        }
        if !value.is_finite() {
            return Err(FixedPointError::NotFinite);
        }
        if value.abs() >= 2.0 {
            return Err(FixedPointError::OutOfRange(value.to_string()));
        }
        let limb_scale = 2f64.powi(LIMB_BITS as i32);
        let mut rest = value.abs() * 2f64.powi(LIMB_BITS as i32 - 1);
        let mut limbs = vec![0; limb_count];
        for limb in limbs.iter_mut() {
            let whole = rest.floor();
            *limb = whole as Limb;
            rest = (rest - whole) * limb_scale;
        }
        if rest >= limb_scale / 2.0 && PortableLimbs::increment(&mut limbs) {
            return Err(FixedPointError::OutOfRange(value.to_string()));
        }
        Ok(Self {
            negative: value < 0.0 && !PortableLimbs::is_zero(&limbs),
            limbs,
        })
    }

    /// Exact conversion of a view coordinate; see [`BigFloat::to_fixed`].
    pub fn from_bigfloat(value: &BigFloat, limb_count: usize) -> Result<Self, FixedPointError> {
        value.to_fixed(limb_count)
    }

    /// Nearest double, for display and previews.
    pub fn to_f64(&self) -> f64 {
        let inv_scale = 2f64.powi(-(LIMB_BITS as i32));
        let mut acc = 0.0;
        for &limb in self.limbs.iter().rev() {
            acc = acc * inv_scale + limb as f64;
        }
        let magnitude = acc * 2f64.powi(-(LIMB_BITS as i32 - 1));
        if self.negative {
            -magnitude
        } else {
            magnitude
        }
    }

    pub fn limb_count(&self) -> usize {
        self.limbs.len()
    }

    pub fn magnitude(&self) -> &[Limb] {
        &self.limbs
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_zero(&self) -> bool {
        PortableLimbs::is_zero(&self.limbs)
    }

    pub fn neg(&self) -> Self {
        Self {
            negative: !self.negative && !self.is_zero(),
            limbs: self.limbs.clone(),
        }
    }

    /// Exact sum, `None` when the result leaves `[-2, 2)`.
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        debug_assert_eq!(self.limb_count(), other.limb_count());
        let mut limbs = self.limbs.clone();
        let negative = if self.negative == other.negative {
            if PortableLimbs::add_assign(&mut limbs, &other.limbs) {
                return None;
            }
            self.negative
        } else if PortableLimbs::sub_assign(&mut limbs, &other.limbs) {
            PortableLimbs::negate(&mut limbs);
            other.negative
        } else {
            self.negative
        };
        Some(Self::normalized(negative, limbs))
    }

    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.checked_add(&other.neg())
    }

    /// Exact product with a small integer, `None` on overflow.
    pub fn mul_int(&self, factor: i64) -> Option<Self> {
        let f = factor.unsigned_abs() as u128;
        let mut limbs = self.limbs.clone();
        let mut carry: u128 = 0;
        for limb in limbs.iter_mut().rev() {
            let t = *limb as u128 * f + carry;
            *limb = t as Limb;
            carry = t >> LIMB_BITS;
        }
        if carry != 0 {
            return None;
        }
        Some(Self::normalized(self.negative != (factor < 0), limbs))
    }

    fn normalized(negative: bool, limbs: Vec<Limb>) -> Self {
        let negative = negative && !PortableLimbs::is_zero(&limbs);
        Self { negative, limbs }
    }
}

/// A point of the complex plane in fixed point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedComplex {
    pub re: FixedPoint,
    pub im: FixedPoint,
}

impl FixedComplex {
    pub fn new(re: FixedPoint, im: FixedPoint) -> Self {
        debug_assert_eq!(re.limb_count(), im.limb_count());
        Self { re, im }
    }

    pub fn from_f64(re: f64, im: f64, limb_count: usize) -> Result<Self, FixedPointError> {
        Ok(Self {
            re: FixedPoint::from_f64(re, limb_count)?,
            im: FixedPoint::from_f64(im, limb_count)?,
        })
    }

    pub fn limb_count(&self) -> usize {
        self.re.limb_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_sets_the_integer_bit() {
        let one = FixedPoint::from_f64(1.0, 2).unwrap();
        assert_eq!(one.magnitude(), &[0x8000_0000_0000_0000, 0]);
        assert!(!one.is_negative());
    }

    #[test]
    fn negative_values_keep_the_sign_flag() {
        let v = FixedPoint::from_f64(-0.75, 2).unwrap();
        assert!(v.is_negative());
        assert_eq!(v.magnitude(), &[0x6000_0000_0000_0000, 0]);
        assert_eq!(v.to_f64(), -0.75);
    }

    #[test]
    fn small_doubles_spill_into_lower_limbs() {
        let tiny = 2f64.powi(-100);
        let v = FixedPoint::from_f64(tiny, 3).unwrap();
        assert_eq!(v.magnitude()[0], 0);
        assert_eq!(v.magnitude()[1], 1 << 27);
        assert_eq!(v.to_f64(), tiny);
    }

    #[test]
    fn two_is_out_of_range() {
        assert!(matches!(
            FixedPoint::from_f64(2.0, 2),
            Err(FixedPointError::OutOfRange(_))
        ));
        assert!(matches!(
            FixedPoint::from_f64(-2.0, 2),
            Err(FixedPointError::OutOfRange(_))
        ));
        assert_eq!(FixedPoint::from_f64(f64::NAN, 2), Err(FixedPointError::NotFinite));
    }

    #[test]
    fn checked_add_handles_mixed_signs() {
        let a = FixedPoint::from_f64(0.25, 2).unwrap();
        let b = FixedPoint::from_f64(-1.0, 2).unwrap();
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.to_f64(), -0.75);
        let back = sum.checked_sub(&b).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn checked_add_detects_overflow() {
        let a = FixedPoint::from_f64(1.5, 2).unwrap();
        assert!(a.checked_add(&a).is_none());
    }

    #[test]
    fn zero_is_never_negative() {
        let a = FixedPoint::from_f64(0.5, 2).unwrap();
        let diff = a.checked_sub(&a).unwrap();
        assert!(diff.is_zero());
        assert!(!diff.is_negative());
    }

    #[test]
    fn mul_int_scales_exactly() {
        let step = FixedPoint::from_f64(1.0 / 64.0, 2).unwrap();
        assert_eq!(step.mul_int(-50).unwrap().to_f64(), -50.0 / 64.0);
        assert!(step.mul_int(128).is_none());
    }
}
