use wide::f32x4;

use super::tables::{FIR4_TABLE, FIR8_TABLE};
use crate::phase::{
    spread_position, SamplePos, FRACTION_BITS, FRACTION_MASK, FRACTION_ONE, MAX_PITCH,
};
use crate::simd::{gather4, hsum, load4, store4};

const MAX_STEP: u32 = MAX_PITCH << FRACTION_BITS;

#[inline(always)]
fn check_step(frac: u32, increment: u32) {
    debug_assert!(frac < FRACTION_ONE, "fractional phase out of range");
    debug_assert!(
        increment > 0 && increment <= MAX_STEP,
        "increment out of range"
    );
}

/// Nearest-sample resampler. `frac` only carries position; sample values are
/// taken as-is, so this is transparent at 1:1 and cheapest everywhere else.
pub fn resample_point(src: &[f32], pos: usize, frac: u32, increment: u32, dst: &mut [f32]) {
    check_step(frac, increment);
    let mut p = SamplePos::new(pos, frac);
    for out in dst.iter_mut() {
        *out = src[p.index];
        p.advance(increment);
    }
}

/// Linear interpolation between `src[pos]` and `src[pos + 1]`; the caller
/// supplies one look-ahead sample past the final position.
pub fn resample_linear(src: &[f32], pos: usize, frac: u32, increment: u32, dst: &mut [f32]) {
    check_step(frac, increment);
    let lane_step = increment * 4;
    let (mut positions, mut fracs) = spread_position(pos, frac, increment);

    let mut written = 0;
    while dst.len() - written > 3 {
        let mu = f32x4::from([
            fracs[0] as f32,
            fracs[1] as f32,
            fracs[2] as f32,
            fracs[3] as f32,
        ]) * f32x4::splat(1.0 / FRACTION_ONE as f32);
        let first = gather4(src, &positions, 0);
        let second = gather4(src, &positions, 1);
        store4(dst, written, (second - first).mul_add(mu, first));
        written += 4;
        for lane in 0..4 {
            fracs[lane] += lane_step;
            positions[lane] += (fracs[lane] >> FRACTION_BITS) as usize;
            fracs[lane] &= FRACTION_MASK;
        }
    }

    let mut p = SamplePos::new(positions[0], fracs[0]);
    for out in dst[written..].iter_mut() {
        *out = linear_tap(src, p);
        p.advance(increment);
    }
}

/// 4-tap windowed-sinc resampler reading `src[pos - 1..=pos + 2]`.
pub fn resample_fir4(src: &[f32], pos: usize, frac: u32, increment: u32, dst: &mut [f32]) {
    check_step(frac, increment);
    debug_assert!(pos >= 1, "4-tap kernel needs one history sample");
    let table: &[[f32; 4]] = &FIR4_TABLE;
    let lane_step = increment * 4;
    let (mut positions, mut fracs) = spread_position(pos, frac, increment);

    let mut written = 0;
    while dst.len() - written > 3 {
        let mut group = [0.0f32; 4];
        for lane in 0..4 {
            let taps = f32x4::from(table[fracs[lane] as usize]);
            let vals = load4(src, positions[lane] - 1);
            group[lane] = hsum(taps * vals);
        }
        store4(dst, written, f32x4::from(group));
        written += 4;
        for lane in 0..4 {
            fracs[lane] += lane_step;
            positions[lane] += (fracs[lane] >> FRACTION_BITS) as usize;
            fracs[lane] &= FRACTION_MASK;
        }
    }

    let mut p = SamplePos::new(positions[0], fracs[0]);
    for out in dst[written..].iter_mut() {
        *out = fir4_tap(src, table, p);
        p.advance(increment);
    }
}

/// 8-tap windowed-sinc resampler reading `src[pos - 3..=pos + 4]`.
pub fn resample_fir8(src: &[f32], pos: usize, frac: u32, increment: u32, dst: &mut [f32]) {
    check_step(frac, increment);
    debug_assert!(pos >= 3, "8-tap kernel needs three history samples");
    let table: &[[f32; 8]] = &FIR8_TABLE;
    let lane_step = increment * 4;
    let (mut positions, mut fracs) = spread_position(pos, frac, increment);

    let mut written = 0;
    while dst.len() - written > 3 {
        let mut group = [0.0f32; 4];
        for lane in 0..4 {
            let row = &table[fracs[lane] as usize];
            let lo = f32x4::from([row[0], row[1], row[2], row[3]]);
            let hi = f32x4::from([row[4], row[5], row[6], row[7]]);
            let val_lo = load4(src, positions[lane] - 3);
            let val_hi = load4(src, positions[lane] + 1);
            group[lane] = hsum(lo * val_lo + hi * val_hi);
        }
        store4(dst, written, f32x4::from(group));
        written += 4;
        for lane in 0..4 {
            fracs[lane] += lane_step;
            positions[lane] += (fracs[lane] >> FRACTION_BITS) as usize;
            fracs[lane] &= FRACTION_MASK;
        }
    }

    let mut p = SamplePos::new(positions[0], fracs[0]);
    for out in dst[written..].iter_mut() {
        *out = fir8_tap(src, table, p);
        p.advance(increment);
    }
}

#[inline(always)]
fn linear_tap(src: &[f32], p: SamplePos) -> f32 {
    let a = src[p.index];
    let b = src[p.index + 1];
    let mu = p.frac as f32 * (1.0 / FRACTION_ONE as f32);
    (b - a).mul_add(mu, a)
}

// The scalar taps keep the vector paths' association order so both sides of
// the remainder split agree.
#[inline(always)]
fn fir4_tap(src: &[f32], table: &[[f32; 4]], p: SamplePos) -> f32 {
    let t = &table[p.frac as usize];
    let v = &src[p.index - 1..p.index + 3];
    (t[0] * v[0] + t[1] * v[1]) + (t[2] * v[2] + t[3] * v[3])
}

#[inline(always)]
fn fir8_tap(src: &[f32], table: &[[f32; 8]], p: SamplePos) -> f32 {
    let t = &table[p.frac as usize];
    let v = &src[p.index - 3..p.index + 5];
    let s0 = t[0] * v[0] + t[4] * v[4];
    let s1 = t[1] * v[1] + t[5] * v[5];
    let s2 = t[2] * v[2] + t[6] * v[6];
    let s3 = t[3] * v[3] + t[7] * v[7];
    (s0 + s1) + (s2 + s3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    fn noise(len: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_linear_half_rate_example() {
        let src = ramp(8);
        let mut dst = [0.0f32; 4];
        resample_linear(&src, 0, 0, FRACTION_ONE / 2, &mut dst);
        assert_eq!(dst, [0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_point_identity_and_decimation() {
        let src = noise(16, 1);
        let mut dst = [0.0f32; 8];
        resample_point(&src, 0, 0, 2 * FRACTION_ONE, &mut dst);
        for (i, out) in dst.iter().enumerate() {
            assert_eq!(*out, src[2 * i], "decimated sample {}", i);
        }

        let mut held = [0.0f32; 8];
        resample_point(&src, 0, 0, FRACTION_ONE / 2, &mut held);
        for (i, out) in held.iter().enumerate() {
            assert_eq!(*out, src[i / 2], "held sample {}", i);
        }
    }

    #[test]
    fn test_linear_identity_is_bit_exact() {
        let src = noise(33, 2);
        let mut dst = vec![0.0f32; 32];
        resample_linear(&src, 0, 0, FRACTION_ONE, &mut dst);
        assert_eq!(dst, src[..32]);
    }

    #[test]
    fn test_linear_decimation_hits_even_samples() {
        let src = noise(40, 3);
        let mut dst = vec![0.0f32; 16];
        resample_linear(&src, 0, 0, 2 * FRACTION_ONE, &mut dst);
        for (i, out) in dst.iter().enumerate() {
            assert_eq!(*out, src[2 * i], "sample {}", i);
        }
    }

    #[test]
    fn test_fir4_identity_is_bit_exact() {
        let src = noise(40, 4);
        let mut dst = vec![0.0f32; 30];
        resample_fir4(&src, 1, 0, FRACTION_ONE, &mut dst);
        for (i, out) in dst.iter().enumerate() {
            assert_eq!(*out, src[1 + i], "sample {}", i);
        }
    }

    #[test]
    fn test_fir8_identity_is_bit_exact() {
        let src = noise(40, 5);
        let mut dst = vec![0.0f32; 30];
        resample_fir8(&src, 3, 0, FRACTION_ONE, &mut dst);
        for (i, out) in dst.iter().enumerate() {
            assert_eq!(*out, src[3 + i], "sample {}", i);
        }
    }

    #[test]
    fn test_linear_vector_and_scalar_paths_agree() {
        let src = noise(200, 6);
        for &increment in &[FRACTION_ONE / 3, FRACTION_ONE, 3 * FRACTION_ONE / 2] {
            for &frac in &[0u32, 700, 4095] {
                let mut dst = vec![0.0f32; 13];
                resample_linear(&src, 2, frac, increment, &mut dst);

                let mut p = SamplePos::new(2, frac);
                for (i, out) in dst.iter().enumerate() {
                    let reference = linear_tap(&src, p);
                    assert!(
                        (out - reference).abs() < 1e-6,
                        "inc {} frac {} sample {}: {} vs {}",
                        increment,
                        frac,
                        i,
                        out,
                        reference
                    );
                    p.advance(increment);
                }
            }
        }
    }

    #[test]
    fn test_fir4_vector_and_scalar_paths_agree() {
        let src = noise(200, 7);
        let table: &[[f32; 4]] = &FIR4_TABLE;
        for &increment in &[FRACTION_ONE / 2, FRACTION_ONE + 333] {
            let mut dst = vec![0.0f32; 11];
            resample_fir4(&src, 4, 512, increment, &mut dst);

            let mut p = SamplePos::new(4, 512);
            for (i, out) in dst.iter().enumerate() {
                let reference = fir4_tap(&src, table, p);
                assert_eq!(*out, reference, "inc {} sample {}", increment, i);
                p.advance(increment);
            }
        }
    }

    #[test]
    fn test_fir8_vector_and_scalar_paths_agree() {
        let src = noise(200, 8);
        let table: &[[f32; 8]] = &FIR8_TABLE;
        for &increment in &[FRACTION_ONE / 2, FRACTION_ONE + 333] {
            let mut dst = vec![0.0f32; 11];
            resample_fir8(&src, 5, 2047, increment, &mut dst);

            let mut p = SamplePos::new(5, 2047);
            for (i, out) in dst.iter().enumerate() {
                let reference = fir8_tap(&src, table, p);
                assert_eq!(*out, reference, "inc {} sample {}", increment, i);
                p.advance(increment);
            }
        }
    }

    #[test]
    fn test_empty_output_is_a_no_op() {
        let src = ramp(8);
        let mut dst: [f32; 0] = [];
        resample_linear(&src, 0, 0, FRACTION_ONE, &mut dst);
        resample_fir8(&src, 3, 0, FRACTION_ONE, &mut dst);
    }
}
