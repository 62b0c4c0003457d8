//! Vectorized sample-rate conversion and gain mixing for audio render loops.
//!
//! The crate covers the inner loops of a software mixer: fixed-point source
//! position tracking, a family of resampler kernels from nearest-sample up to
//! a band-limited sinc bank, gain-ramped channel mixing, and an HRTF
//! applicator. All kernels run over caller-owned slices and keep no hidden
//! state beyond lazily built coefficient tables.

pub mod hrtf;
pub mod mix;
pub mod phase;
pub mod resample;
mod simd;

use thiserror::Error;

pub use hrtf::{crossfade_steps, mix_hrtf, HrtfParams, HrtfState};
pub use mix::{mix, mix_row, GAIN_SILENCE_THRESHOLD};
pub use phase::{rate_increment, SamplePos, FRACTION_BITS, FRACTION_MASK, FRACTION_ONE, MAX_PITCH};
pub use resample::{Quality, Resampler};

/// Errors from the validated setup paths. The per-sample kernels are
/// infallible and assert their preconditions in debug builds instead.
#[derive(Error, Debug)]
pub enum MixerError {
    /// Source sample rate of zero makes the pitch undefined
    #[error("source sample rate must be non-zero")]
    ZeroSourceRate,

    /// Output sample rate of zero makes the pitch undefined
    #[error("output sample rate must be non-zero")]
    ZeroOutputRate,

    /// Impulse responses are applied two taps at a time within the ring
    #[error("invalid impulse response length {0}: need an even tap count of at most 32")]
    InvalidIrSize(usize),

    /// A coefficient crossfade must run for at least one sample
    #[error("coefficient crossfade must span at least one step")]
    ZeroCrossfade,
}
