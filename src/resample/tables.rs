use std::f64::consts::PI;

use once_cell::sync::Lazy;

use crate::phase::FRACTION_ONE;

/// Stopband rejection of the 4-tap bank, in dB.
const FIR4_REJECTION: f64 = 40.0;
/// Stopband rejection of the 8-tap bank, in dB.
const FIR8_REJECTION: f64 = 60.0;

/// One row of taps per fractional phase; tap `j` of the row for phase `mu`
/// weights `src[pos + j - (TAPS/2 - 1)]`.
pub(crate) static FIR4_TABLE: Lazy<Vec<[f32; 4]>> =
    Lazy::new(|| build_fir_bank::<4>(FIR4_REJECTION));

pub(crate) static FIR8_TABLE: Lazy<Vec<[f32; 8]>> =
    Lazy::new(|| build_fir_bank::<8>(FIR8_REJECTION));

fn build_fir_bank<const TAPS: usize>(rejection: f64) -> Vec<[f32; TAPS]> {
    let beta = kaiser_beta(rejection);
    let half_width = (TAPS / 2) as f64;
    let center = TAPS as i32 / 2 - 1;

    let mut rows = Vec::with_capacity(FRACTION_ONE as usize);
    for phase in 0..FRACTION_ONE {
        let mu = f64::from(phase) / f64::from(FRACTION_ONE);
        let mut taps = [0.0f64; TAPS];
        let mut sum = 0.0;
        for (j, tap) in taps.iter_mut().enumerate() {
            let x = f64::from(j as i32 - center) - mu;
            *tap = sinc(x) * kaiser(beta, x / half_width);
            sum += *tap;
        }
        // Normalize to unit DC gain so the bank adds no amplitude ripple
        // across phases.
        let mut row = [0.0f32; TAPS];
        for (out, tap) in row.iter_mut().zip(taps.iter()) {
            *out = (tap / sum) as f32;
        }
        rows.push(row);
    }
    log::debug!("built {}-tap resampler bank, {} phases", TAPS, rows.len());
    rows
}

/// Normalized sinc, evaluated through argument reduction so that integer
/// arguments come out exactly zero. Phase-zero rows then reduce to exact
/// unit impulses, which keeps 1:1 resampling bit-transparent.
pub(crate) fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    let nearest = x.round();
    let reduced = x - nearest;
    let sign = if (nearest as i64) & 1 == 0 { 1.0 } else { -1.0 };
    sign * (PI * reduced).sin() / (PI * x)
}

/// Kaiser window of shape `beta` at normalized offset `k` in [-1, 1].
pub(crate) fn kaiser(beta: f64, k: f64) -> f64 {
    if !(-1.0..=1.0).contains(&k) {
        return 0.0;
    }
    bessel_i0(beta * (1.0 - k * k).sqrt()) / bessel_i0(beta)
}

/// Window shape for a given stopband rejection in dB, per the kaiserord
/// design rule.
pub(crate) fn kaiser_beta(rejection: f64) -> f64 {
    if rejection > 50.0 {
        0.1102 * (rejection - 8.7)
    } else if rejection >= 21.0 {
        0.5842 * (rejection - 21.0).powf(0.4) + 0.07886 * (rejection - 21.0)
    } else {
        0.0
    }
}

/// Zeroth-order modified Bessel function of the first kind, by series
/// expansion.
pub(crate) fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut sum = 1.0;
    let mut term = 1.0;
    let mut k = 1.0;
    loop {
        let factor = half / k;
        term *= factor * factor;
        sum += term;
        if term < sum * 1e-12 {
            return sum;
        }
        k += 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_zero_rows_are_unit_impulses() {
        assert_eq!(FIR4_TABLE[0], [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(FIR8_TABLE[0], [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rows_are_dc_normalized() {
        for &phase in &[1usize, 1000, 2048, 4095] {
            let sum4: f32 = FIR4_TABLE[phase].iter().sum();
            assert!(
                (sum4 - 1.0).abs() < 1e-4,
                "4-tap row {} sums to {}",
                phase,
                sum4
            );
            let sum8: f32 = FIR8_TABLE[phase].iter().sum();
            assert!(
                (sum8 - 1.0).abs() < 1e-4,
                "8-tap row {} sums to {}",
                phase,
                sum8
            );
        }
    }

    #[test]
    fn test_rows_are_phase_symmetric() {
        let phase = 300usize;
        let mirror = FRACTION_ONE as usize - phase;
        for j in 0..4 {
            let a = FIR4_TABLE[phase][j];
            let b = FIR4_TABLE[mirror][3 - j];
            assert!(
                (a - b).abs() < 1e-6,
                "taps {} and {} differ: {} vs {}",
                j,
                3 - j,
                a,
                b
            );
        }
    }

    #[test]
    fn test_sinc_is_exactly_zero_at_integers() {
        for k in 1..=8i32 {
            assert_eq!(sinc(f64::from(k)), 0.0, "sinc({})", k);
            assert_eq!(sinc(f64::from(-k)), 0.0, "sinc({})", -k);
        }
        assert_eq!(sinc(0.0), 1.0);
    }

    #[test]
    fn test_sinc_matches_direct_form_off_integers() {
        for &x in &[0.3f64, 0.5, 1.7, -2.4, 5.25] {
            let direct = (PI * x).sin() / (PI * x);
            assert!(
                (sinc(x) - direct).abs() < 1e-12,
                "sinc({}) = {} vs {}",
                x,
                sinc(x),
                direct
            );
        }
    }

    #[test]
    fn test_bessel_i0_reference_values() {
        assert_eq!(bessel_i0(0.0), 1.0);
        assert!((bessel_i0(1.0) - 1.2660658777520084).abs() < 1e-9);
        assert!((bessel_i0(5.0) - 27.239871823604442).abs() < 1e-7);
    }

    #[test]
    fn test_kaiser_window_shape() {
        let beta = kaiser_beta(60.0);
        assert_eq!(kaiser(beta, 0.0), 1.0);
        assert_eq!(kaiser(beta, 0.4), kaiser(beta, -0.4));
        assert!(kaiser(beta, 0.9) < kaiser(beta, 0.1));
        assert_eq!(kaiser(beta, 1.5), 0.0);
    }

    #[test]
    fn test_kaiser_beta_design_rule() {
        assert!((kaiser_beta(60.0) - 5.65326).abs() < 1e-4);
        assert!((kaiser_beta(40.0) - 3.39532).abs() < 1e-4);
        assert_eq!(kaiser_beta(20.0), 0.0);
    }
}
