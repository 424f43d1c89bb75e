//! Double-precision escape-time kernels.
//!
//! All kernels share one recurrence and one operation order, so a point
//! gets the same count whether it runs alone or in a vector lane:
//! `rq = zr·zr; iq = zi·zi; stop unless rq + iq < 4; zi = 2·(zi·zr) + ci;
//! zr = (rq − iq) + cr`, starting from `z = 0`. The count is the index of
//! the first orbit point with `|z|² ≥ 4`, or the cap.

pub use crate::simd::{escape_batch, LANES};

pub const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Escape count for a single point.
#[inline]
pub fn escape_time(cr: f64, ci: f64, max_iter: u32) -> u32 {
    let mut zr = 0.0_f64;
    let mut zi = 0.0_f64;
    for n in 0..max_iter {
        let rq = zr * zr;
        let iq = zi * zi;
        // negated so NaN counts as escaped, like the ordered vector compare
        if !(rq + iq < ESCAPE_RADIUS_SQ) {
            return n;
        }
        zi *= zr;
        zi = zi + zi + ci;
        zr = rq - iq + cr;
    }
    max_iter
}

/// Portable lane kernel for any width.
///
/// Escaped lanes keep iterating but their mask stays cleared, freezing
/// their count. The loop ends once every lane has escaped.
pub fn escape_lanes<const N: usize>(cr: &[f64; N], ci: &[f64; N], max_iter: u32) -> [u32; N] {
    let mut zr = [0.0_f64; N];
    let mut zi = [0.0_f64; N];
    let mut active = [true; N];
    let mut count = [0_u32; N];
    for _ in 0..max_iter {
        let mut any = false;
        for lane in 0..N {
            let rq = zr[lane] * zr[lane];
            let iq = zi[lane] * zi[lane];
            active[lane] &= rq + iq < ESCAPE_RADIUS_SQ;
            if active[lane] {
                count[lane] += 1;
                any = true;
            }
            let t = zi[lane] * zr[lane];
            zi[lane] = t + t + ci[lane];
            zr[lane] = rq - iq + cr[lane];
        }
        if !any {
            break;
        }
    }
    count
}
