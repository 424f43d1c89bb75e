//! Limb-vector arithmetic for the fixed-point escape kernel.
//!
//! Slices hold `u64` limbs, most-significant limb first, so equal-length
//! slices compare lexicographically. Every operation works in place on
//! caller-provided buffers; nothing here allocates.

use std::cmp::Ordering;

/// One machine word of a fixed-point magnitude.
pub type Limb = u64;

/// Bits per limb.
pub const LIMB_BITS: u32 = 64;

/// Carry-aware arithmetic over limb slices.
///
/// Every method has a portable default; accelerated implementations
/// override only what their hardware does better.
pub trait LimbArith {
    /// `acc += rhs`, returns the carry out of the most significant limb.
    fn add_assign(acc: &mut [Limb], rhs: &[Limb]) -> bool {
        debug_assert_eq!(acc.len(), rhs.len());
        let mut carry = false;
        for (a, &b) in acc.iter_mut().rev().zip(rhs.iter().rev()) {
            let (s1, c1) = a.overflowing_add(b);
            let (s2, c2) = s1.overflowing_add(carry as Limb);
            *a = s2;
            carry = c1 | c2;
        }
        carry
    }

    /// `acc -= rhs`, returns the borrow out of the most significant limb.
    fn sub_assign(acc: &mut [Limb], rhs: &[Limb]) -> bool {
        debug_assert_eq!(acc.len(), rhs.len());
        let mut borrow = false;
        for (a, &b) in acc.iter_mut().rev().zip(rhs.iter().rev()) {
            let (d1, b1) = a.overflowing_sub(b);
            let (d2, b2) = d1.overflowing_sub(borrow as Limb);
            *a = d2;
            borrow = b1 | b2;
        }
        borrow
    }

    /// Adds one at the least significant limb, returns the carry out.
    fn increment(acc: &mut [Limb]) -> bool {
        for limb in acc.iter_mut().rev() {
            *limb = limb.wrapping_add(1);
            if *limb != 0 {
                return false;
            }
        }
        true
    }

    /// Two's complement negation modulo `2^(64·len)`.
    fn negate(acc: &mut [Limb]) {
        for limb in acc.iter_mut() {
            *limb = !*limb;
        }
        Self::increment(acc);
    }

    /// Full product `dst = a · b`; `dst.len()` must be `a.len() + b.len()`.
    fn mul(dst: &mut [Limb], a: &[Limb], b: &[Limb]) {
        let (na, nb, nd) = (a.len(), b.len(), dst.len());
        debug_assert_eq!(nd, na + nb);
        dst.fill(0);
        for i in 0..na {
            let ai = a[na - 1 - i] as u128;
            if ai == 0 {
                continue;
            }
            let mut carry: u128 = 0;
            for j in 0..nb {
                let idx = nd - 1 - (i + j);
                let t = ai * b[nb - 1 - j] as u128 + dst[idx] as u128 + carry;
                dst[idx] = t as Limb;
                carry = t >> LIMB_BITS;
            }
            dst[nd - 1 - (i + nb)] = carry as Limb;
        }
    }

    /// Full square `dst = a²`; `dst.len()` must be `2 · a.len()`.
    ///
    /// Off-diagonal products are formed once and doubled before the
    /// diagonal squares are added.
    fn square(dst: &mut [Limb], a: &[Limb]) {
        let (n, nd) = (a.len(), dst.len());
        debug_assert_eq!(nd, 2 * n);
        dst.fill(0);
        for i in 0..n {
            let ai = a[n - 1 - i] as u128;
            if ai == 0 {
                continue;
            }
            let mut carry: u128 = 0;
            for j in (i + 1)..n {
                let idx = nd - 1 - (i + j);
                let t = ai * a[n - 1 - j] as u128 + dst[idx] as u128 + carry;
                dst[idx] = t as Limb;
                carry = t >> LIMB_BITS;
            }
            if i + 1 < n {
                dst[nd - 1 - (i + n)] = carry as Limb;
            }
        }
        Self::shift_left(dst, 1);
        let mut carry: u128 = 0;
        for i in 0..n {
            let sq = (a[n - 1 - i] as u128) * (a[n - 1 - i] as u128);
            let lo_idx = nd - 1 - 2 * i;
            let hi_idx = lo_idx - 1;
            let t = dst[lo_idx] as u128 + (sq as Limb) as u128 + carry;
            dst[lo_idx] = t as Limb;
            let t = dst[hi_idx] as u128 + (sq >> LIMB_BITS) + (t >> LIMB_BITS);
            dst[hi_idx] = t as Limb;
            carry = t >> LIMB_BITS;
        }
        debug_assert_eq!(carry, 0);
    }

    /// Shifts left by `bits` (`0 < bits < 64`) in place and returns the
    /// bits pushed out of the top limb.
    fn shift_left(acc: &mut [Limb], bits: u32) -> Limb {
        debug_assert!(bits > 0 && bits < LIMB_BITS);
        let mut carry: Limb = 0;
        for limb in acc.iter_mut().rev() {
            let v = *limb;
            *limb = (v << bits) | carry;
            carry = v >> (LIMB_BITS - bits);
        }
        carry
    }

    fn compare(a: &[Limb], b: &[Limb]) -> Ordering {
        debug_assert_eq!(a.len(), b.len());
        a.cmp(b)
    }

    fn is_zero(a: &[Limb]) -> bool {
        a.iter().all(|&l| l == 0)
    }
}

/// Plain Rust implementation, available everywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct PortableLimbs;

impl LimbArith for PortableLimbs {}

/// x86_64 add/sub through the carry-flag intrinsics.
#[cfg(target_arch = "x86_64")]
#[derive(Clone, Copy, Debug, Default)]
pub struct AdcLimbs;

#[cfg(target_arch = "x86_64")]
impl LimbArith for AdcLimbs {
    fn add_assign(acc: &mut [Limb], rhs: &[Limb]) -> bool {
        use std::arch::x86_64::_addcarry_u64;
        debug_assert_eq!(acc.len(), rhs.len());
        let mut carry = 0u8;
        for (a, &b) in acc.iter_mut().rev().zip(rhs.iter().rev()) {
            let mut out = 0;
            carry = _addcarry_u64(carry, *a, b, &mut out);
            *a = out;
        }
        carry != 0
    }

    fn sub_assign(acc: &mut [Limb], rhs: &[Limb]) -> bool {
        use std::arch::x86_64::_subborrow_u64;
        debug_assert_eq!(acc.len(), rhs.len());
        let mut borrow = 0u8;
        for (a, &b) in acc.iter_mut().rev().zip(rhs.iter().rev()) {
            let mut out = 0;
            borrow = _subborrow_u64(borrow, *a, b, &mut out);
            *a = out;
        }
        borrow != 0
    }
}

/// The fastest implementation for the compile target.
#[cfg(target_arch = "x86_64")]
pub type NativeLimbs = AdcLimbs;

/// The fastest implementation for the compile target.
#[cfg(not(target_arch = "x86_64"))]
pub type NativeLimbs = PortableLimbs;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_propagates_carry_across_limbs() {
        let mut a = [0, Limb::MAX, Limb::MAX];
        let carry = PortableLimbs::add_assign(&mut a, &[0, 0, 1]);
        assert!(!carry);
        assert_eq!(a, [1, 0, 0]);
    }

    #[test]
    fn add_reports_carry_out_of_top_limb() {
        let mut a = [Limb::MAX, Limb::MAX];
        assert!(PortableLimbs::add_assign(&mut a, &[0, 1]));
        assert_eq!(a, [0, 0]);
    }

    #[test]
    fn sub_reports_borrow_and_wraps() {
        let mut a = [0, 5];
        assert!(PortableLimbs::sub_assign(&mut a, &[0, 6]));
        assert_eq!(a, [Limb::MAX, Limb::MAX]);
    }

    #[test]
    fn negate_is_twos_complement() {
        let mut a = [0, 1];
        PortableLimbs::negate(&mut a);
        assert_eq!(a, [Limb::MAX, Limb::MAX]);
        PortableLimbs::negate(&mut a);
        assert_eq!(a, [0, 1]);
    }

    #[test]
    fn negate_of_zero_is_zero() {
        let mut a = [0, 0, 0];
        PortableLimbs::negate(&mut a);
        assert!(PortableLimbs::is_zero(&a));
    }

    #[test]
    fn mul_small_values() {
        let mut dst = [0; 4];
        PortableLimbs::mul(&mut dst, &[0, 3], &[1, 7]);
        // (2^64 + 7) * 3
        assert_eq!(dst, [0, 0, 3, 21]);
    }

    #[test]
    fn square_matches_mul() {
        let a = [0x8000_0000_0000_0001, 0xdead_beef_0000_1234, Limb::MAX];
        let mut sq = [0; 6];
        let mut prod = [0; 6];
        PortableLimbs::square(&mut sq, &a);
        PortableLimbs::mul(&mut prod, &a, &a);
        assert_eq!(sq, prod);
    }

    #[test]
    fn square_of_all_ones() {
        let a = [Limb::MAX; 3];
        let mut sq = [0; 6];
        let mut prod = [0; 6];
        PortableLimbs::square(&mut sq, &a);
        PortableLimbs::mul(&mut prod, &a, &a);
        assert_eq!(sq, prod);
    }

    #[test]
    fn shift_left_returns_spilled_bits() {
        let mut a = [0xC000_0000_0000_0000, 0x8000_0000_0000_0000];
        let out = PortableLimbs::shift_left(&mut a, 2);
        assert_eq!(out, 3);
        assert_eq!(a, [2, 0]);
    }

    #[test]
    fn compare_is_lexicographic_from_top() {
        assert_eq!(PortableLimbs::compare(&[1, 0], &[0, Limb::MAX]), Ordering::Greater);
        assert_eq!(PortableLimbs::compare(&[1, 2], &[1, 2]), Ordering::Equal);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn adc_matches_portable() {
        let a = [0x1234, Limb::MAX, 0x8000_0000_0000_0000];
        let b = [0x4321, 1, 0x8000_0000_0000_0000];
        let (mut p, mut q) = (a, a);
        assert_eq!(
            PortableLimbs::add_assign(&mut p, &b),
            AdcLimbs::add_assign(&mut q, &b)
        );
        assert_eq!(p, q);
        let (mut p, mut q) = (b, b);
        assert_eq!(
            PortableLimbs::sub_assign(&mut p, &a),
            AdcLimbs::sub_assign(&mut q, &a)
        );
        assert_eq!(p, q);
    }
}
