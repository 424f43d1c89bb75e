//! Vector-unit kernels behind [`escape_batch`].
//!
//! The lane width is fixed at compile time from the enabled target
//! features: four lanes with AVX, two with SSE2 or NEON, otherwise one.
//! Every kernel follows the operation order documented in
//! [`crate::mandelbrot`].

#[cfg(all(target_arch = "x86_64", target_feature = "avx"))]
mod arch {
    use std::arch::x86_64::*;

    pub const LANES: usize = 4;

    pub fn escape_batch(cr: &[f64; LANES], ci: &[f64; LANES], max_iter: u32) -> [u32; LANES] {
        let mut out = [0.0_f64; LANES];
        // SAFETY: AVX is enabled for this build; loads and stores go
        // through fixed-size arrays of exactly LANES doubles.
        unsafe {
            let cr = _mm256_loadu_pd(cr.as_ptr());
            let ci = _mm256_loadu_pd(ci.as_ptr());
            let four = _mm256_set1_pd(4.0);
            let one = _mm256_set1_pd(1.0);
            let mut zr = _mm256_setzero_pd();
            let mut zi = _mm256_setzero_pd();
            let mut count = _mm256_setzero_pd();
            let mut active = _mm256_castsi256_pd(_mm256_set1_epi64x(-1));
            for _ in 0..max_iter {
                let rq = _mm256_mul_pd(zr, zr);
                let iq = _mm256_mul_pd(zi, zi);
                let inside = _mm256_cmp_pd::<_CMP_LT_OQ>(_mm256_add_pd(rq, iq), four);
                active = _mm256_and_pd(active, inside);
                if _mm256_movemask_pd(active) == 0 {
                    break;
                }
                count = _mm256_add_pd(count, _mm256_and_pd(active, one));
                let t = _mm256_mul_pd(zi, zr);
                zi = _mm256_add_pd(_mm256_add_pd(t, t), ci);
                zr = _mm256_add_pd(_mm256_sub_pd(rq, iq), cr);
            }
            _mm256_storeu_pd(out.as_mut_ptr(), count);
        }
        out.map(|c| c as u32)
    }
}

#[cfg(all(target_arch = "x86_64", not(target_feature = "avx")))]
mod arch {
    use std::arch::x86_64::*;

    pub const LANES: usize = 2;

    pub fn escape_batch(cr: &[f64; LANES], ci: &[f64; LANES], max_iter: u32) -> [u32; LANES] {
        let mut out = [0.0_f64; LANES];
        // SAFETY: SSE2 is part of the x86_64 baseline; loads and stores go
        // through fixed-size arrays of exactly LANES doubles.
        unsafe {
            let cr = _mm_loadu_pd(cr.as_ptr());
            let ci = _mm_loadu_pd(ci.as_ptr());
            let four = _mm_set1_pd(4.0);
            let one = _mm_set1_pd(1.0);
            let mut zr = _mm_setzero_pd();
            let mut zi = _mm_setzero_pd();
            let mut count = _mm_setzero_pd();
            let mut active = _mm_castsi128_pd(_mm_set1_epi64x(-1));
            for _ in 0..max_iter {
                let rq = _mm_mul_pd(zr, zr);
                let iq = _mm_mul_pd(zi, zi);
                active = _mm_and_pd(active, _mm_cmplt_pd(_mm_add_pd(rq, iq), four));
                if _mm_movemask_pd(active) == 0 {
                    break;
                }
                count = _mm_add_pd(count, _mm_and_pd(active, one));
                let t = _mm_mul_pd(zi, zr);
                zi = _mm_add_pd(_mm_add_pd(t, t), ci);
                zr = _mm_add_pd(_mm_sub_pd(rq, iq), cr);
            }
            _mm_storeu_pd(out.as_mut_ptr(), count);
        }
        out.map(|c| c as u32)
    }
}

#[cfg(target_arch = "aarch64")]
mod arch {
    use std::arch::aarch64::*;

    pub const LANES: usize = 2;

    pub fn escape_batch(cr: &[f64; LANES], ci: &[f64; LANES], max_iter: u32) -> [u32; LANES] {
        let mut out = [0_u64; LANES];
        // SAFETY: NEON is mandatory on aarch64; loads and stores go
        // through fixed-size arrays of exactly LANES elements.
        unsafe {
            let cr = vld1q_f64(cr.as_ptr());
            let ci = vld1q_f64(ci.as_ptr());
            let four = vdupq_n_f64(4.0);
            let mut zr = vdupq_n_f64(0.0);
            let mut zi = vdupq_n_f64(0.0);
            let mut count = vdupq_n_u64(0);
            let mut active = vdupq_n_u64(u64::MAX);
            for _ in 0..max_iter {
                let rq = vmulq_f64(zr, zr);
                let iq = vmulq_f64(zi, zi);
                active = vandq_u64(active, vcltq_f64(vaddq_f64(rq, iq), four));
                if vmaxvq_u32(vreinterpretq_u32_u64(active)) == 0 {
                    break;
                }
                // an active lane is all ones, i.e. -1
                count = vsubq_u64(count, active);
                let t = vmulq_f64(zi, zr);
                zi = vaddq_f64(vaddq_f64(t, t), ci);
                zr = vaddq_f64(vsubq_f64(rq, iq), cr);
            }
            vst1q_u64(out.as_mut_ptr(), count);
        }
        out.map(|c| c as u32)
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod arch {
    pub const LANES: usize = 1;

    pub fn escape_batch(cr: &[f64; LANES], ci: &[f64; LANES], max_iter: u32) -> [u32; LANES] {
        [crate::mandelbrot::escape_time(cr[0], ci[0], max_iter)]
    }
}

/// Pixels evaluated together by [`escape_batch`].
pub use arch::LANES;

/// Escape counts for `LANES` points at once.
pub use arch::escape_batch;
