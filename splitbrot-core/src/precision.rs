//! Arithmetic selection for a given pixel step.
//!
//! Doubles are used while adjacent pixels stay well apart in f64; below
//! that the escape kernel switches to fixed point with enough limbs to
//! resolve one pixel step plus guard bits.

use crate::limbs::LIMB_BITS;
use crate::BigFloat;
use serde::{Deserialize, Serialize};

/// Smallest pixel step (log2) still computed in double precision.
pub const DOUBLE_LIMIT_LOG2: f64 = -44.0;

/// Extra bits below one pixel step, absorbing rounding over long orbits.
const GUARD_BITS: f64 = 32.0;

/// Fewest limbs the fixed-point path runs with.
pub const MIN_FIXED_LIMBS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    Double,
    Fixed { limbs: usize },
}

impl Precision {
    /// Picks the arithmetic for a unity-pixel vector `(re, im)`.
    pub fn for_unity(unity: &(BigFloat, BigFloat)) -> Self {
        let log2_step = unity.0.log2_approx().max(unity.1.log2_approx());
        Self::for_log2_step(log2_step)
    }

    pub fn for_log2_step(log2_step: f64) -> Self {
        if log2_step >= DOUBLE_LIMIT_LOG2 {
            return Precision::Double;
        }
        // one integer bit, the bits down to one pixel, then guard bits
        let bits = 1.0 - log2_step + GUARD_BITS;
        let limbs = (bits / LIMB_BITS as f64).ceil() as usize;
        Precision::Fixed {
            limbs: limbs.max(MIN_FIXED_LIMBS),
        }
    }

    pub fn limb_count(&self) -> Option<usize> {
        match self {
            Precision::Double => None,
            Precision::Fixed { limbs } => Some(*limbs),
        }
    }

    /// BigFloat precision that carries view coordinates without losing
    /// anything the kernels can see.
    pub fn coordinate_bits(&self) -> usize {
        match self {
            Precision::Double => 128,
            Precision::Fixed { limbs } => (limbs + 1) * LIMB_BITS as usize,
        }
    }
}
