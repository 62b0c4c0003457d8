//! Band-limited sinc resampler.
//!
//! A bank of Kaiser-windowed sinc filters over 16 scales and 16 fractional
//! phases, built once at startup. Each output sample bilinearly blends the
//! bank in scale and phase: scale follows the resampling ratio so the
//! passband narrows when downsampling, phase follows the fractional position.

use once_cell::sync::Lazy;
use wide::f32x4;

use super::tables::{kaiser, kaiser_beta, sinc};
use crate::phase::{SamplePos, FRACTION_BITS, FRACTION_ONE};
use crate::simd::{hsum, load4};

const BSINC_PHASE_BITS: u32 = 4;
const BSINC_PHASE_COUNT: usize = 1 << BSINC_PHASE_BITS;
const BSINC_SCALE_COUNT: usize = 16;
const BSINC_POINTS_MAX: usize = 24;
const BSINC_REJECTION: f64 = 60.0;

/// Lowest design scale; ratios below it clamp to the widest lowpass.
const BSINC_SCALE_BASE: f64 = 1.510578918e-1;
const BSINC_SCALE_RANGE: f64 = 1.0 - BSINC_SCALE_BASE;

const FRAC_PHASE_BITDIFF: u32 = FRACTION_BITS - BSINC_PHASE_BITS;
const FRAC_PHASE_MASK: u32 = (1 << FRAC_PHASE_BITDIFF) - 1;

/// Tap counts per scale index, widest for the lowest scales. Always a
/// multiple of four so the tap loop needs no remainder handling.
const BSINC_TAP_COUNTS: [usize; BSINC_SCALE_COUNT] =
    [24, 24, 24, 24, 24, 24, 24, 20, 20, 20, 16, 16, 16, 12, 12, 12];

struct ScaleFilters {
    m: usize,
    // Per phase, four m-sized runs: filter, scale delta, phase delta,
    // scale-phase delta.
    coeffs: Vec<f32>,
}

static BSINC_BANK: Lazy<Vec<ScaleFilters>> = Lazy::new(build_bsinc_bank);

fn build_bsinc_bank() -> Vec<ScaleFilters> {
    let beta = kaiser_beta(BSINC_REJECTION);
    let center = BSINC_POINTS_MAX as i32 / 2 - 1;

    // Every scale is evaluated on the widest tap grid in f64, zero outside
    // its own window, with one extra phase row at mu = 1 for the phase
    // deltas. Rows are normalized to unit DC gain; at scale 1, phase 0 this
    // leaves an exact unit impulse, which keeps 1:1 resampling transparent.
    let mut rows =
        vec![[[0.0f64; BSINC_POINTS_MAX]; BSINC_PHASE_COUNT + 1]; BSINC_SCALE_COUNT];
    for (si, scale_rows) in rows.iter_mut().enumerate() {
        let t = si as f64 / (BSINC_SCALE_COUNT - 1) as f64;
        let scale = BSINC_SCALE_BASE * (1.0 - t) + t;
        let half_width = BSINC_TAP_COUNTS[si] as f64 / 2.0;
        for (pi, row) in scale_rows.iter_mut().enumerate() {
            let mu = pi as f64 / BSINC_PHASE_COUNT as f64;
            let mut sum = 0.0;
            for (i, tap) in row.iter_mut().enumerate() {
                let x = f64::from(i as i32 - center) - mu;
                *tap = scale * sinc(scale * x) * kaiser(beta, x / half_width);
                sum += *tap;
            }
            for tap in row.iter_mut() {
                *tap /= sum;
            }
        }
    }

    let mut bank = Vec::with_capacity(BSINC_SCALE_COUNT);
    for si in 0..BSINC_SCALE_COUNT {
        let m = BSINC_TAP_COUNTS[si];
        let off = (BSINC_POINTS_MAX - m) / 2;
        let last = si == BSINC_SCALE_COUNT - 1;
        let mut coeffs = Vec::with_capacity(4 * m * BSINC_PHASE_COUNT);
        for pi in 0..BSINC_PHASE_COUNT {
            for j in off..off + m {
                coeffs.push(rows[si][pi][j] as f32);
            }
            for j in off..off + m {
                let d = if last { 0.0 } else { rows[si + 1][pi][j] - rows[si][pi][j] };
                coeffs.push(d as f32);
            }
            for j in off..off + m {
                coeffs.push((rows[si][pi + 1][j] - rows[si][pi][j]) as f32);
            }
            for j in off..off + m {
                let d = if last {
                    0.0
                } else {
                    (rows[si + 1][pi + 1][j] - rows[si + 1][pi][j])
                        - (rows[si][pi + 1][j] - rows[si][pi][j])
                };
                coeffs.push(d as f32);
            }
        }
        bank.push(ScaleFilters { m, coeffs });
    }
    log::debug!(
        "built band-limited sinc bank, {} scales x {} phases",
        BSINC_SCALE_COUNT,
        BSINC_PHASE_COUNT
    );
    bank
}

#[derive(Clone, Copy)]
struct PhaseCoeffs {
    filter: &'static [f32],
    sc_delta: &'static [f32],
    ph_delta: &'static [f32],
    sp_delta: &'static [f32],
}

/// Prepared bsinc filter selection for one resampling ratio.
///
/// Owns no table data, only slices into the shared bank, so it is cheap to
/// clone into per-source state whenever the increment changes.
#[derive(Clone)]
pub struct BsincState {
    sf: f32,
    m: usize,
    lead: usize,
    phases: [PhaseCoeffs; BSINC_PHASE_COUNT],
}

impl BsincState {
    /// Selects the filter scale for `increment`. Downsampling picks a
    /// proportionally lower scale plus a blend factor toward the next one;
    /// upsampling always uses the full-bandwidth scale.
    pub fn new(increment: u32) -> Self {
        let bank = Lazy::force(&BSINC_BANK);

        let (si, sf) = if increment > FRACTION_ONE {
            let ratio = FRACTION_ONE as f32 / increment as f32;
            if ratio >= BSINC_SCALE_BASE as f32 {
                let pos = (BSINC_SCALE_COUNT - 1) as f32 * (ratio - BSINC_SCALE_BASE as f32)
                    / BSINC_SCALE_RANGE as f32;
                let si = pos as usize;
                if si >= BSINC_SCALE_COUNT - 1 {
                    (BSINC_SCALE_COUNT - 1, 0.0)
                } else {
                    (si, 1.0 - (pos - si as f32).asin().cos())
                }
            } else {
                (0, 0.0)
            }
        } else {
            (BSINC_SCALE_COUNT - 1, 0.0)
        };

        let filters = &bank[si];
        let m = filters.m;
        let phases: [PhaseCoeffs; BSINC_PHASE_COUNT] = std::array::from_fn(|pi| {
            let chunk = &filters.coeffs[pi * 4 * m..(pi + 1) * 4 * m];
            PhaseCoeffs {
                filter: &chunk[..m],
                sc_delta: &chunk[m..2 * m],
                ph_delta: &chunk[2 * m..3 * m],
                sp_delta: &chunk[3 * m..],
            }
        });
        Self {
            sf,
            m,
            lead: m / 2 - 1,
            phases,
        }
    }

    /// Number of filter taps for the selected scale.
    pub fn taps(&self) -> usize {
        self.m
    }

    /// History samples required before the nominal position.
    pub fn lead(&self) -> usize {
        self.lead
    }

    /// Look-ahead samples required past the nominal position.
    pub fn lag(&self) -> usize {
        self.m / 2
    }
}

/// Band-limited sinc resampler reading `state.taps()` samples around each
/// position, `state.lead()` of them behind it.
pub fn resample_bsinc(
    state: &BsincState,
    src: &[f32],
    pos: usize,
    frac: u32,
    increment: u32,
    dst: &mut [f32],
) {
    debug_assert!(frac < FRACTION_ONE, "fractional phase out of range");
    debug_assert!(increment > 0, "increment out of range");
    debug_assert!(pos >= state.lead, "missing history samples");

    let sf = f32x4::splat(state.sf);
    let mut p = SamplePos::new(pos, frac);
    for out in dst.iter_mut() {
        let pi = (p.frac >> FRAC_PHASE_BITDIFF) as usize;
        let pf = (p.frac & FRAC_PHASE_MASK) as f32 * (1.0 / (1 << FRAC_PHASE_BITDIFF) as f32);
        let phase = &state.phases[pi];
        let start = p.index - state.lead;

        let pf4 = f32x4::splat(pf);
        let mut acc = f32x4::ZERO;
        let mut j = 0;
        while j < state.m {
            let fil = load4(phase.filter, j);
            let scd = load4(phase.sc_delta, j);
            let phd = load4(phase.ph_delta, j);
            let spd = load4(phase.sp_delta, j);
            let coeff = scd.mul_add(sf, fil) + spd.mul_add(sf, phd) * pf4;
            acc = coeff.mul_add(load4(src, start + j), acc);
            j += 4;
        }
        *out = hsum(acc);
        p.advance(increment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn noise(len: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_prepare_selects_top_scale_for_upsampling() {
        for &increment in &[FRACTION_ONE / 4, FRACTION_ONE / 2, FRACTION_ONE] {
            let state = BsincState::new(increment);
            assert_eq!(state.taps(), 12, "increment {}", increment);
            assert_eq!(state.sf, 0.0, "increment {}", increment);
            assert_eq!(state.lead(), 5);
            assert_eq!(state.lag(), 6);
        }
    }

    #[test]
    fn test_prepare_widens_for_downsampling() {
        let state = BsincState::new(2 * FRACTION_ONE);
        assert_eq!(state.taps(), 24);
        assert!(state.sf >= 0.0 && state.sf < 1.0, "sf = {}", state.sf);
        assert_eq!(state.lead(), 11);
    }

    #[test]
    fn test_prepare_clamps_past_design_range() {
        // An 8:1 ratio is below the lowest design scale
        let state = BsincState::new(8 * FRACTION_ONE);
        assert_eq!(state.taps(), 24);
        assert_eq!(state.sf, 0.0);
    }

    #[test]
    fn test_identity_at_unity_is_bit_exact() {
        let state = BsincState::new(FRACTION_ONE);
        let src = noise(64, 21);
        let mut dst = vec![0.0f32; 40];
        resample_bsinc(&state, &src, state.lead(), 0, FRACTION_ONE, &mut dst);
        for (i, out) in dst.iter().enumerate() {
            assert_eq!(*out, src[state.lead() + i], "sample {}", i);
        }
    }

    #[test]
    fn test_preserves_dc_across_ratios() {
        let src = vec![1.0f32; 256];
        for &increment in &[
            FRACTION_ONE / 2,
            FRACTION_ONE,
            3 * FRACTION_ONE / 2,
            3 * FRACTION_ONE,
        ] {
            let state = BsincState::new(increment);
            let mut dst = vec![0.0f32; 32];
            resample_bsinc(&state, &src, 16, 100, increment, &mut dst);
            for (i, out) in dst.iter().enumerate() {
                assert!(
                    (out - 1.0).abs() < 1e-4,
                    "increment {} sample {}: {}",
                    increment,
                    i,
                    out
                );
            }
        }
    }

    #[test]
    fn test_downsampling_attenuates_nyquist() {
        // Alternating full-scale samples sit at the source Nyquist rate,
        // well into the stopband of a half-rate scale.
        let src: Vec<f32> = (0..256).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let state = BsincState::new(2 * FRACTION_ONE);
        let mut dst = vec![0.0f32; 64];
        resample_bsinc(&state, &src, 16, 0, 2 * FRACTION_ONE, &mut dst);
        let peak = dst.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        assert!(peak < 0.05, "Nyquist leaked through at {}", peak);
    }

    #[test]
    fn test_kernel_matches_scalar_evaluation() {
        let src = noise(128, 22);
        let increment = 2 * FRACTION_ONE + 555;
        let state = BsincState::new(increment);
        let mut dst = vec![0.0f32; 17];
        resample_bsinc(&state, &src, 12, 321, increment, &mut dst);

        let mut p = SamplePos::new(12, 321);
        for (i, out) in dst.iter().enumerate() {
            let pi = (p.frac >> FRAC_PHASE_BITDIFF) as usize;
            let pf = (p.frac & FRAC_PHASE_MASK) as f32 / (1 << FRAC_PHASE_BITDIFF) as f32;
            let phase = &state.phases[pi];
            let mut acc = 0.0f64;
            for j in 0..state.m {
                let coeff = (phase.filter[j] + state.sf * phase.sc_delta[j])
                    + pf * (phase.ph_delta[j] + state.sf * phase.sp_delta[j]);
                acc += f64::from(coeff) * f64::from(src[p.index - state.lead + j]);
            }
            assert!(
                (f64::from(*out) - acc).abs() < 1e-5,
                "sample {}: {} vs {}",
                i,
                out,
                acc
            );
            p.advance(increment);
        }
    }
}
