//! Fixed-point escape-time kernel.
//!
//! Iterates `z ← z² + c` on limb vectors. Squares and the cross product
//! are formed at double width, then rounded back to working width by the
//! first dropped bit. Escape is detected from carries: the squared
//! magnitude overflows the double-width range exactly when `|z|² ≥ 4`,
//! and a component that leaves `[-2, 2)` while being formed proves the
//! next squared magnitude is at least 4.

use crate::cancellation::CancellationChecker;
use crate::fatal::fatal;
use splitbrot_core::{FixedComplex, Limb, LimbArith, NativeLimbs};
use std::marker::PhantomData;

/// Iterations between cancellation polls.
const POLL_INTERVAL: u32 = 1024;

/// Scratch space for one limb count, reused across pixels.
pub struct FixedEscape<A: LimbArith = NativeLimbs> {
    limbs: usize,
    xr: Vec<Limb>,
    xi: Vec<Limb>,
    xr2: Vec<Limb>,
    xi2: Vec<Limb>,
    wide: Vec<Limb>,
    _arith: PhantomData<A>,
}

impl<A: LimbArith> FixedEscape<A> {
    pub fn new(limbs: usize) -> Self {
        Self {
            limbs,
            xr: vec![0; limbs],
            xi: vec![0; limbs],
            xr2: vec![0; 2 * limbs],
            xi2: vec![0; 2 * limbs],
            wide: vec![0; 2 * limbs],
            _arith: PhantomData,
        }
    }

    pub fn limb_count(&self) -> usize {
        self.limbs
    }

    /// Escape count of `c`, with the same counting rule as the double
    /// kernels. `None` when `cancel` fired mid-orbit.
    pub fn escape_time(
        &mut self,
        c: &FixedComplex,
        max_iter: u32,
        cancel: &impl CancellationChecker,
    ) -> Option<u32> {
        debug_assert_eq!(c.limb_count(), self.limbs);
        let n = self.limbs;
        let (cr, cr_neg) = (c.re.magnitude(), c.re.is_negative());
        let (ci, ci_neg) = (c.im.magnitude(), c.im.is_negative());

        // z1 = c
        self.xr.copy_from_slice(cr);
        self.xi.copy_from_slice(ci);
        let mut xr_neg = cr_neg;
        let mut xi_neg = ci_neg;
        let mut iter: u32 = 1;

        loop {
            if iter >= max_iter {
                return Some(max_iter);
            }
            A::square(&mut self.xr2, &self.xr);
            A::square(&mut self.xi2, &self.xi);
            self.wide.copy_from_slice(&self.xr2);
            if A::add_assign(&mut self.wide, &self.xi2) {
                return Some(iter);
            }
            if iter % POLL_INTERVAL == 0 && cancel.is_cancelled() {
                return None;
            }
            iter += 1;

            // imaginary part: 2·xr·xi + ci
            A::mul(&mut self.wide, &self.xr, &self.xi);
            let overflow = round_high::<A>(&mut self.wide, n, 2);
            if overflow > 3 {
                fatal(format_args!("cross product overflow word {overflow}"));
            }
            let (product, _) = self.wide.split_at(n);
            match combine::<A>(&mut self.xi, product, overflow, xr_neg != xi_neg, ci, ci_neg) {
                Some(negative) => xi_neg = negative,
                None => return Some(iter),
            }

            // real part: xr² − xi² + cr
            self.wide.copy_from_slice(&self.xr2);
            let difference_neg = A::sub_assign(&mut self.wide, &self.xi2);
            if difference_neg {
                A::negate(&mut self.wide);
            }
            let overflow = round_high::<A>(&mut self.wide, n, 1);
            if overflow > 1 {
                fatal(format_args!("square difference overflow word {overflow}"));
            }
            let (difference, _) = self.wide.split_at(n);
            match combine::<A>(&mut self.xr, difference, overflow, difference_neg, cr, cr_neg) {
                Some(negative) => xr_neg = negative,
                None => return Some(iter),
            }
        }
    }
}

/// Scales a double-width product back to working width.
///
/// Shifts `wide` left by `shift` bits, keeps the top `n` limbs and rounds
/// them up when the first dropped bit is set. Returns the bits pushed
/// above the working width, including a carry out of the rounding.
fn round_high<A: LimbArith>(wide: &mut [Limb], n: usize, shift: u32) -> Limb {
    let mut overflow = A::shift_left(wide, shift);
    let (high, low) = wide.split_at_mut(n);
    if low[0] >> 63 == 1 && A::increment(high) {
        overflow += 1;
    }
    overflow
}

/// `out = v + c` for signed magnitudes, where `v` may carry a small
/// overflow word above the working width.
///
/// Returns the sign of the result, or `None` when the result provably
/// lies outside `(-2, 2)`.
fn combine<A: LimbArith>(
    out: &mut [Limb],
    v: &[Limb],
    v_overflow: Limb,
    v_neg: bool,
    c: &[Limb],
    c_neg: bool,
) -> Option<bool> {
    if v_overflow >= 2 {
        return None;
    }
    out.copy_from_slice(v);
    if v_neg == c_neg {
        if v_overflow == 1 || A::add_assign(out, c) {
            return None;
        }
        return Some(v_neg);
    }
    let borrow = A::sub_assign(out, c);
    match (v_overflow, borrow) {
        // 2 + v − c dropped below 2: the wrapped limbs are the result
        (1, true) => Some(v_neg),
        (1, false) => None,
        (_, true) => {
            A::negate(out);
            Some(c_neg)
        }
        (_, false) => Some(v_neg),
    }
}
