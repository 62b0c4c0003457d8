//! HRTF filtering through an accumulation ring.
//!
//! Each input sample scatters its contribution across the next `ir_size`
//! ring slots, weighted per ear by the HRIR taps; a slot is complete when
//! the cursor reaches it. Stepped tap application crossfades between two
//! filters without a second convolution pass.

use wide::f32x4;

use crate::MixerError;

pub const HRIR_LENGTH: usize = 32;
pub const HRIR_MASK: usize = HRIR_LENGTH - 1;
pub const HRTF_HISTORY_LENGTH: usize = 64;
pub const HRTF_HISTORY_MASK: usize = HRTF_HISTORY_LENGTH - 1;

/// Stereo tap weights, one pair per ring slot.
pub type HrirCoeffs = [[f32; 2]; HRIR_LENGTH];

/// Filter parameters for one source: taps, pending crossfade increments,
/// per-ear history delays and the shared gain ramp.
#[derive(Clone)]
pub struct HrtfParams {
    pub coeffs: HrirCoeffs,
    pub coeff_step: HrirCoeffs,
    pub delay: [usize; 2],
    pub gain: f32,
    pub gain_step: f32,
}

impl HrtfParams {
    /// A settled filter with no crossfade or gain ramp pending.
    pub fn with_filter(coeffs: HrirCoeffs, delay: [usize; 2], gain: f32) -> Self {
        Self {
            coeffs,
            coeff_step: [[0.0; 2]; HRIR_LENGTH],
            delay,
            gain,
            gain_step: 0.0,
        }
    }
}

/// Per-tap increments that morph `from` into `to` over `count` stepped
/// applications of the first `ir_size` taps.
pub fn crossfade_steps(
    from: &HrirCoeffs,
    to: &HrirCoeffs,
    ir_size: usize,
    count: usize,
) -> Result<HrirCoeffs, MixerError> {
    if ir_size < 2 || ir_size > HRIR_LENGTH || ir_size % 2 != 0 {
        return Err(MixerError::InvalidIrSize(ir_size));
    }
    if count == 0 {
        return Err(MixerError::ZeroCrossfade);
    }
    let scale = 1.0 / count as f32;
    let mut steps = [[0.0f32; 2]; HRIR_LENGTH];
    for (step, (new, old)) in steps.iter_mut().zip(to.iter().zip(from.iter())).take(ir_size) {
        step[0] = (new[0] - old[0]) * scale;
        step[1] = (new[1] - old[1]) * scale;
    }
    Ok(steps)
}

/// Per-source convolution state: the input history feeding the delay taps
/// plus the partial-sum ring.
#[derive(Clone)]
pub struct HrtfState {
    history: [f32; HRTF_HISTORY_LENGTH],
    values: [[f32; 2]; HRIR_LENGTH],
}

impl HrtfState {
    pub fn new() -> Self {
        Self {
            history: [0.0; HRTF_HISTORY_LENGTH],
            values: [[0.0; 2]; HRIR_LENGTH],
        }
    }

    /// Drops all buffered signal, e.g. when a source restarts.
    pub fn clear(&mut self) {
        self.history = [0.0; HRTF_HISTORY_LENGTH];
        self.values = [[0.0; 2]; HRIR_LENGTH];
    }
}

impl Default for HrtfState {
    fn default() -> Self {
        Self::new()
    }
}

#[inline(always)]
fn check_ring(values: &[[f32; 2]], ir_size: usize, coeffs: usize) {
    debug_assert!(values.len().is_power_of_two(), "ring length");
    debug_assert!(ir_size >= 2 && ir_size % 2 == 0, "taps applied in pairs");
    debug_assert!(ir_size <= values.len(), "impulse response exceeds ring");
    debug_assert!(ir_size <= coeffs, "missing tap coefficients");
}

/// Adds one sample pair into the ring, two taps per iteration.
pub fn apply_coeffs(
    offset: usize,
    values: &mut [[f32; 2]],
    ir_size: usize,
    coeffs: &[[f32; 2]],
    left: f32,
    right: f32,
) {
    check_ring(values, ir_size, coeffs.len());
    let mask = values.len() - 1;
    let lrlr = f32x4::from([left, right, left, right]);

    let mut c = 0;
    while c < ir_size {
        let o0 = (offset + c) & mask;
        let o1 = (o0 + 1) & mask;
        let vals = f32x4::from([values[o0][0], values[o0][1], values[o1][0], values[o1][1]]);
        let coefs = f32x4::from([coeffs[c][0], coeffs[c][1], coeffs[c + 1][0], coeffs[c + 1][1]]);
        let vals = coefs.mul_add(lrlr, vals).to_array();
        values[o0] = [vals[0], vals[1]];
        values[o1] = [vals[2], vals[3]];
        c += 2;
    }
}

/// Like [`apply_coeffs`], but advances every tap by its step afterwards so
/// repeated calls walk the filter toward a new response.
pub fn apply_coeffs_step(
    offset: usize,
    values: &mut [[f32; 2]],
    ir_size: usize,
    coeffs: &mut [[f32; 2]],
    steps: &[[f32; 2]],
    left: f32,
    right: f32,
) {
    check_ring(values, ir_size, coeffs.len());
    debug_assert!(ir_size <= steps.len(), "missing step coefficients");
    let mask = values.len() - 1;
    let lrlr = f32x4::from([left, right, left, right]);

    let mut c = 0;
    while c < ir_size {
        let o0 = (offset + c) & mask;
        let o1 = (o0 + 1) & mask;
        let vals = f32x4::from([values[o0][0], values[o0][1], values[o1][0], values[o1][1]]);
        let coefs = f32x4::from([coeffs[c][0], coeffs[c][1], coeffs[c + 1][0], coeffs[c + 1][1]]);
        let vals = coefs.mul_add(lrlr, vals).to_array();
        values[o0] = [vals[0], vals[1]];
        values[o1] = [vals[2], vals[3]];

        let stepped = coefs
            + f32x4::from([steps[c][0], steps[c][1], steps[c + 1][0], steps[c + 1][1]]);
        let s = stepped.to_array();
        coeffs[c] = [s[0], s[1]];
        coeffs[c + 1] = [s[2], s[3]];
        c += 2;
    }
}

/// Renders a mono input to both ears through the delayed, HRIR-weighted
/// ring, accumulating into the output pair.
///
/// The first `counter` samples use stepped taps (and step the gain); the
/// rest apply the settled filter. `offset` is the monotonically increasing
/// ring cursor for this source and the advanced value is returned, to be
/// passed back in on the next block.
pub fn mix_hrtf(
    out_left: &mut [f32],
    out_right: &mut [f32],
    input: &[f32],
    counter: usize,
    offset: usize,
    ir_size: usize,
    params: &mut HrtfParams,
    state: &mut HrtfState,
) -> usize {
    debug_assert_eq!(out_left.len(), out_right.len(), "stereo output pair");
    debug_assert!(input.len() <= out_left.len(), "output shorter than input");
    debug_assert!(
        params.delay[0] < HRTF_HISTORY_LENGTH && params.delay[1] < HRTF_HISTORY_LENGTH,
        "delay exceeds history"
    );

    let mut offset = offset;
    let mut gain = params.gain;
    let stepped = input.len().min(counter);

    for (pos, &sample) in input.iter().enumerate() {
        state.history[offset & HRTF_HISTORY_MASK] = sample;
        let left = state.history[offset.wrapping_sub(params.delay[0]) & HRTF_HISTORY_MASK] * gain;
        let right = state.history[offset.wrapping_sub(params.delay[1]) & HRTF_HISTORY_MASK] * gain;

        // The slot leaving the active window starts a fresh partial sum
        state.values[(offset + ir_size) & HRIR_MASK] = [0.0, 0.0];
        offset += 1;

        if pos < stepped {
            apply_coeffs_step(
                offset,
                &mut state.values,
                ir_size,
                &mut params.coeffs,
                &params.coeff_step,
                left,
                right,
            );
            gain += params.gain_step;
        } else {
            apply_coeffs(offset, &mut state.values, ir_size, &params.coeffs, left, right);
        }

        let value = state.values[offset & HRIR_MASK];
        out_left[pos] += value[0];
        out_right[pos] += value[1];
    }

    params.gain = gain;
    offset
}
