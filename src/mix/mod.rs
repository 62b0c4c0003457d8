use wide::f32x4;

use crate::simd::{load4, store4};

/// Gains at or below this magnitude contribute nothing audible; channels
/// sitting there are skipped outright.
pub const GAIN_SILENCE_THRESHOLD: f32 = 1e-5;

/// Mixes `input` into every output channel with per-channel gain ramps.
///
/// `counter` is the number of samples left in the fade shared by all
/// channels; each channel ramps from `current_gains[c]` toward
/// `target_gains[c]` over that span, snapping exactly onto the target when
/// the ramp completes inside this call. `current_gains` is updated in place
/// so a fade can resume on the next call (callers count `counter` down by
/// the samples mixed). With `counter` at zero the targets apply immediately.
///
/// Channels whose settled gain sits within `GAIN_SILENCE_THRESHOLD` stop
/// contributing once the ramp portion has been written.
pub fn mix(
    input: &[f32],
    outputs: &mut [&mut [f32]],
    current_gains: &mut [f32],
    target_gains: &[f32],
    counter: usize,
    out_pos: usize,
) {
    debug_assert_eq!(outputs.len(), current_gains.len(), "gain per channel");
    debug_assert_eq!(outputs.len(), target_gains.len(), "gain per channel");

    let delta = if counter > 0 {
        1.0 / counter as f32
    } else {
        0.0
    };

    for (channel, out) in outputs.iter_mut().enumerate() {
        let out = &mut out[out_pos..out_pos + input.len()];
        let mut gain = current_gains[channel];
        let step = (target_gains[channel] - gain) * delta;
        let mut pos = 0;

        if step.abs() > f32::EPSILON {
            let ramp_len = input.len().min(counter);
            let step4 = f32x4::splat(step * 4.0);
            let mut gain4 = f32x4::from([
                gain,
                gain + step,
                gain + 2.0 * step,
                gain + 3.0 * step,
            ]);
            while ramp_len - pos > 3 {
                store4(out, pos, load4(input, pos).mul_add(gain4, load4(out, pos)));
                gain4 += step4;
                pos += 4;
            }
            gain = gain4.to_array()[0];
            while pos < ramp_len {
                out[pos] += input[pos] * gain;
                gain += step;
                pos += 1;
            }
            if pos == counter {
                gain = target_gains[channel];
            }
            current_gains[channel] = gain;
        } else if counter == 0 {
            gain = target_gains[channel];
            current_gains[channel] = gain;
        }

        if !(gain.abs() > GAIN_SILENCE_THRESHOLD) {
            continue;
        }

        let gain4 = f32x4::splat(gain);
        while input.len() - pos > 3 {
            store4(out, pos, load4(input, pos).mul_add(gain4, load4(out, pos)));
            pos += 4;
        }
        while pos < input.len() {
            out[pos] += input[pos] * gain;
            pos += 1;
        }
    }
}

/// Accumulates a bank of input channels into one output row at fixed gains.
///
/// The static-matrix counterpart of [`mix`]: no ramps and no state, just
/// `out[i] += inputs[c][in_pos + i] * gains[c]` with silent channels
/// skipped.
pub fn mix_row(out: &mut [f32], gains: &[f32], inputs: &[&[f32]], in_pos: usize) {
    debug_assert_eq!(gains.len(), inputs.len(), "gain per input channel");

    for (input, &gain) in inputs.iter().zip(gains.iter()) {
        if !(gain.abs() > GAIN_SILENCE_THRESHOLD) {
            continue;
        }
        let input = &input[in_pos..in_pos + out.len()];
        let gain4 = f32x4::splat(gain);
        let mut pos = 0;
        while out.len() - pos > 3 {
            store4(out, pos, load4(input, pos).mul_add(gain4, load4(out, pos)));
            pos += 4;
        }
        while pos < out.len() {
            out[pos] += input[pos] * gain;
            pos += 1;
        }
    }
}
