use dashu::integer::UBig;
use proptest::collection::vec;
use proptest::prelude::*;
use splitbrot_core::{Limb, LimbArith, NativeLimbs, PortableLimbs, LIMB_BITS};
use std::cmp::Ordering;

fn to_ubig(limbs: &[Limb]) -> UBig {
    limbs
        .iter()
        .fold(UBig::ZERO, |acc, &limb| (acc << LIMB_BITS as usize) + UBig::from(limb))
}

fn modulus(limb_count: usize) -> UBig {
    UBig::ONE << (LIMB_BITS as usize * limb_count)
}

fn pair() -> impl Strategy<Value = (Vec<Limb>, Vec<Limb>)> {
    (1usize..6).prop_flat_map(|n| (vec(any::<Limb>(), n), vec(any::<Limb>(), n)))
}

proptest! {
    #[test]
    fn add_matches_big_integers((a, b) in pair()) {
        let mut sum = a.clone();
        let carry = NativeLimbs::add_assign(&mut sum, &b);
        let exact = to_ubig(&a) + to_ubig(&b);
        let m = modulus(a.len());
        prop_assert_eq!(carry, exact >= m);
        prop_assert_eq!(to_ubig(&sum), exact % m);
    }

    #[test]
    fn sub_matches_big_integers((a, b) in pair()) {
        let mut diff = a.clone();
        let borrow = NativeLimbs::sub_assign(&mut diff, &b);
        let (ua, ub) = (to_ubig(&a), to_ubig(&b));
        prop_assert_eq!(borrow, ua < ub);
        let expected = (ua + modulus(a.len()) - ub) % modulus(a.len());
        prop_assert_eq!(to_ubig(&diff), expected);
    }

    #[test]
    fn mul_is_the_exact_product((a, b) in pair()) {
        let mut product = vec![0; 2 * a.len()];
        PortableLimbs::mul(&mut product, &a, &b);
        prop_assert_eq!(to_ubig(&product), to_ubig(&a) * to_ubig(&b));
    }

    #[test]
    fn square_is_the_exact_square(a in vec(any::<Limb>(), 1..8)) {
        let mut square = vec![0; 2 * a.len()];
        PortableLimbs::square(&mut square, &a);
        let ua = to_ubig(&a);
        prop_assert_eq!(to_ubig(&square), &ua * &ua);
    }

    #[test]
    fn shift_left_spills_the_top_bits(a in vec(any::<Limb>(), 1..6), bits in 1u32..64) {
        let mut shifted = a.clone();
        let spilled = PortableLimbs::shift_left(&mut shifted, bits);
        let exact = to_ubig(&a) << bits as usize;
        let m = modulus(a.len());
        prop_assert_eq!(to_ubig(&shifted), &exact % &m);
        prop_assert_eq!(UBig::from(spilled), exact / m);
    }

    #[test]
    fn negate_is_the_additive_inverse(a in vec(any::<Limb>(), 1..6)) {
        let mut negated = a.clone();
        PortableLimbs::negate(&mut negated);
        let m = modulus(a.len());
        prop_assert_eq!((to_ubig(&a) + to_ubig(&negated)) % m, UBig::ZERO);
    }

    #[test]
    fn compare_orders_like_integers((a, b) in pair()) {
        let expected = to_ubig(&a).cmp(&to_ubig(&b));
        prop_assert_eq!(PortableLimbs::compare(&a, &b), expected);
    }
}

#[test]
fn increment_carries_through_every_limb() {
    let mut all_ones = vec![Limb::MAX; 3];
    assert!(PortableLimbs::increment(&mut all_ones));
    assert!(PortableLimbs::is_zero(&all_ones));

    let mut value = vec![0, Limb::MAX];
    assert!(!PortableLimbs::increment(&mut value));
    assert_eq!(value, vec![1, 0]);
    assert_eq!(PortableLimbs::compare(&value, &[1, 0]), Ordering::Equal);
}
