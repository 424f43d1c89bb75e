use splitbrot_compute::mandelbrot::escape_lanes;
use splitbrot_compute::{
    escape_batch, escape_time, BigFloat, FixedComplex, FixedEscape, NativeLimbs, NeverCancel,
    PortableLimbs, LANES,
};

/// Escape count from a plain arbitrary-precision orbit, same counting
/// rule as the kernels.
fn reference_escape(re: f64, im: f64, max_iter: u32, bits: usize) -> u32 {
    let cr = BigFloat::with_precision(re, bits);
    let ci = BigFloat::with_precision(im, bits);
    let four = BigFloat::with_precision(4.0, bits);
    let mut zr = BigFloat::zero(bits);
    let mut zi = BigFloat::zero(bits);
    for n in 0..max_iter {
        let rq = zr.mul(&zr);
        let iq = zi.mul(&zi);
        if rq.add(&iq) >= four {
            return n;
        }
        let cross = zr.mul(&zi);
        zi = cross.add(&cross).add(&ci);
        zr = rq.sub(&iq).add(&cr);
    }
    max_iter
}

fn fixed_escape(re: f64, im: f64, max_iter: u32, limbs: usize) -> u32 {
    let c = FixedComplex::from_f64(re, im, limbs).unwrap();
    FixedEscape::<NativeLimbs>::new(limbs)
        .escape_time(&c, max_iter, &NeverCancel)
        .unwrap()
}

// Points whose orbits stay clear of |z|² = 4 within double rounding, so
// every arithmetic lands on the same count.
const POINTS: [(f64, f64); 5] = [
    (0.0, 0.0),
    (-1.0, 0.0),
    (-0.1, 0.1),
    (-0.75, 1.0 / 512.0),
    (0.25 + 1.0 / 65536.0, 0.0),
];

#[test]
fn double_fixed_and_reference_agree() {
    const MAX_ITER: u32 = 10_000;
    for &(re, im) in &POINTS {
        let double = escape_time(re, im, MAX_ITER);
        assert_eq!(reference_escape(re, im, MAX_ITER, 256), double, "({re}, {im})");
        for limbs in [2, 4, 16] {
            assert_eq!(
                fixed_escape(re, im, MAX_ITER, limbs),
                double,
                "({re}, {im}) with {limbs} limbs"
            );
        }
    }
}

#[test]
fn near_boundary_points_take_long_orbits() {
    // the neck at -3/4 and the cusp at 1/4 both slow the orbit down
    let neck = escape_time(-0.75, 1.0 / 512.0, 10_000);
    assert!((1000..10_000).contains(&neck), "neck escaped after {neck}");
    let cusp = escape_time(0.25 + 1.0 / 65536.0, 0.0, 10_000);
    assert!((500..10_000).contains(&cusp), "cusp escaped after {cusp}");
}

#[test]
fn vector_lanes_match_scalar_counts() {
    let mut cr = [0.0; LANES];
    let mut ci = [0.0; LANES];
    for lane in 0..LANES {
        let (re, im) = POINTS[lane % POINTS.len()];
        cr[lane] = re;
        ci[lane] = im;
    }
    let counts = escape_batch(&cr, &ci, 10_000);
    let portable = escape_lanes(&cr, &ci, 10_000);
    for lane in 0..LANES {
        assert_eq!(counts[lane], escape_time(cr[lane], ci[lane], 10_000));
        assert_eq!(portable[lane], counts[lane]);
    }
}

#[test]
fn portable_limbs_match_native_limbs() {
    for &(re, im) in &POINTS {
        let c = FixedComplex::from_f64(re, im, 4).unwrap();
        let native = FixedEscape::<NativeLimbs>::new(4).escape_time(&c, 10_000, &NeverCancel);
        let portable = FixedEscape::<PortableLimbs>::new(4).escape_time(&c, 10_000, &NeverCancel);
        assert_eq!(native, portable, "({re}, {im})");
    }
}

#[test]
fn deep_zoom_point_matches_reference() {
    const MAX_ITER: u32 = 50_000;
    let (re, im) = (-1.401155, 0.0);
    let fixed = fixed_escape(re, im, MAX_ITER, 16);
    let reference = reference_escape(re, im, MAX_ITER, 1100);
    assert_eq!(fixed, reference);
}
