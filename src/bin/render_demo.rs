//! Offline render of the mixer primitives.
//!
//! Sweeps a tone through every resampler quality tier with ramped stereo
//! gains, then pans a noise burst across the head through the HRTF
//! applicator, and writes the result as a 16-bit WAV.

use std::f64::consts::PI;

use dasp_sample::Sample;
use hound::{SampleFormat, WavSpec, WavWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use audio_mixer::hrtf::{crossfade_steps, mix_hrtf, HrirCoeffs, HrtfParams, HrtfState, HRIR_LENGTH};
use audio_mixer::{mix, rate_increment, Quality, Resampler, FRACTION_BITS};

const SOURCE_RATE: u32 = 32_000;
const OUTPUT_RATE: u32 = 48_000;
const TONE_HZ: f64 = 440.0;
const TONE_LEVEL: f32 = 0.5;
const SEGMENT_FRAMES: usize = 24_000;
const FADE_FRAMES: usize = 2_400;
const HRTF_FRAMES: usize = 36_000;
const HRTF_BLOCK: usize = 512;
const HRTF_IR_SIZE: usize = 8;

const QUALITY_TIERS: [Quality; 5] = [
    Quality::Point,
    Quality::Linear,
    Quality::Fir4,
    Quality::Fir8,
    Quality::Bsinc,
];

fn main() -> anyhow::Result<()> {
    let out_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "render_demo.wav".to_string());
    let increment = rate_increment(SOURCE_RATE, OUTPUT_RATE)?;

    let total_frames = QUALITY_TIERS.len() * SEGMENT_FRAMES + HRTF_FRAMES;
    let mut left = vec![0.0f32; total_frames];
    let mut right = vec![0.0f32; total_frames];

    println!("=== RESAMPLER TIERS ===");
    let mut gains = [0.0f32; 2];
    for (tier, &quality) in QUALITY_TIERS.iter().enumerate() {
        let resampler = Resampler::new(quality, increment);
        let segment = render_tone_segment(&resampler, increment, SEGMENT_FRAMES);
        let start = tier * SEGMENT_FRAMES;

        // Walk the tone across the stereo field, one tier at a time
        let pan = tier as f32 / (QUALITY_TIERS.len() - 1) as f32;
        let targets = [TONE_LEVEL * (1.0 - pan).sqrt(), TONE_LEVEL * pan.sqrt()];

        let sustain = SEGMENT_FRAMES - FADE_FRAMES;
        let mut outs = [&mut left[..], &mut right[..]];
        mix(&segment[..sustain], &mut outs, &mut gains, &targets, FADE_FRAMES, start);
        mix(
            &segment[sustain..],
            &mut outs,
            &mut gains,
            &[0.0, 0.0],
            FADE_FRAMES,
            start + sustain,
        );

        println!(
            "  {:?}: {} frames, {} history + {} look-ahead samples",
            quality,
            SEGMENT_FRAMES,
            resampler.lead(),
            resampler.lag()
        );
    }

    println!("=== HRTF SWEEP ===");
    let mut rng = StdRng::seed_from_u64(0x00AF_5EED);
    let noise: Vec<f32> = (0..HRTF_FRAMES).map(|_| rng.random_range(-0.25..0.25)).collect();

    let hrtf_start = QUALITY_TIERS.len() * SEGMENT_FRAMES;
    let n_blocks = HRTF_FRAMES.div_ceil(HRTF_BLOCK);
    let (coeffs, delay) = synthetic_hrir(-1.0, HRTF_IR_SIZE);
    let mut params = HrtfParams::with_filter(coeffs, delay, 0.0);
    let mut state = HrtfState::new();
    let mut offset = 0;

    for (block_index, block) in noise.chunks(HRTF_BLOCK).enumerate() {
        let progress = (block_index + 1) as f32 / n_blocks as f32;
        let (target, delay) = synthetic_hrir(2.0 * progress - 1.0, HRTF_IR_SIZE);
        let settled_gain = if block_index + 1 == n_blocks { 0.0 } else { 1.0 };

        params.coeff_step = crossfade_steps(&params.coeffs, &target, HRTF_IR_SIZE, block.len())?;
        params.delay = delay;
        params.gain_step = (settled_gain - params.gain) / block.len() as f32;

        let start = hrtf_start + block_index * HRTF_BLOCK;
        let end = start + block.len();
        offset = mix_hrtf(
            &mut left[start..end],
            &mut right[start..end],
            block,
            block.len(),
            offset,
            HRTF_IR_SIZE,
            &mut params,
            &mut state,
        );
    }
    println!(
        "  {} blocks of {} frames, {} taps per ear",
        n_blocks, HRTF_BLOCK, HRTF_IR_SIZE
    );

    let peak = left
        .iter()
        .chain(right.iter())
        .fold(0.0f32, |peak, &sample| peak.max(sample.abs()));
    if peak > 0.99 {
        let scale = 0.99 / peak;
        for sample in left.iter_mut().chain(right.iter_mut()) {
            *sample *= scale;
        }
        println!("Normalized peak {:.3} down to 0.99", peak);
    }

    let spec = WavSpec {
        channels: 2,
        sample_rate: OUTPUT_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&out_path, spec)?;
    for frame in 0..total_frames {
        writer.write_sample(i16::from_sample(left[frame]))?;
        writer.write_sample(i16::from_sample(right[frame]))?;
    }
    writer.finalize()?;

    println!(
        "Wrote {} ({:.2} s at {} Hz)",
        out_path,
        total_frames as f64 / OUTPUT_RATE as f64,
        OUTPUT_RATE
    );
    Ok(())
}

/// Renders `frames` output samples of the demo tone through one kernel,
/// synthesizing just enough padded source signal to feed it.
fn render_tone_segment(resampler: &Resampler, increment: u32, frames: usize) -> Vec<f32> {
    let advance = ((frames as u64 * increment as u64) >> FRACTION_BITS) as usize;
    let src_len = resampler.lead() + advance + resampler.lag() + 2;

    let phase_step = 2.0 * PI * TONE_HZ / SOURCE_RATE as f64;
    let src: Vec<f32> = (0..src_len)
        .map(|n| (phase_step * n as f64).sin() as f32)
        .collect();

    let mut dst = vec![0.0f32; frames];
    resampler.run(&src, resampler.lead(), 0, increment, &mut dst);
    dst
}

/// A toy head model: equal-power panning with a short per-ear decay and an
/// interaural delay that grows toward the far ear. `azimuth` runs from -1
/// (hard left) to 1 (hard right).
fn synthetic_hrir(azimuth: f32, ir_size: usize) -> (HrirCoeffs, [usize; 2]) {
    let pan = (azimuth + 1.0) * 0.5;
    let left_gain = (1.0 - pan).sqrt();
    let right_gain = pan.sqrt();

    let mut coeffs: HrirCoeffs = [[0.0; 2]; HRIR_LENGTH];
    for (tap, pair) in coeffs.iter_mut().take(ir_size).enumerate() {
        let decay = 0.5f32.powi(tap as i32);
        pair[0] = left_gain * decay;
        pair[1] = right_gain * decay;
    }

    let itd = (3.0 * azimuth).round();
    let delay = [(4.0 + itd).max(0.0) as usize, (4.0 - itd).max(0.0) as usize];
    (coeffs, delay)
}
