use crate::MixerError;

pub const FRACTION_BITS: u32 = 12;
pub const FRACTION_ONE: u32 = 1 << FRACTION_BITS;
pub const FRACTION_MASK: u32 = FRACTION_ONE - 1;

/// Upper bound on the resampling ratio.
pub const MAX_PITCH: u32 = 255;

/// Integer sample index plus a 12-bit fractional phase.
///
/// Every resampler consumes source positions in this form. `advance` folds
/// fractional overflow into the integer index, so `frac` always stays below
/// `FRACTION_ONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplePos {
    pub index: usize,
    pub frac: u32,
}

impl SamplePos {
    pub fn new(index: usize, frac: u32) -> Self {
        debug_assert!(frac < FRACTION_ONE, "fractional phase out of range");
        Self { index, frac }
    }

    /// Steps the position by one output sample at the given increment.
    #[inline(always)]
    pub fn advance(&mut self, increment: u32) {
        self.frac += increment;
        self.index += (self.frac >> FRACTION_BITS) as usize;
        self.frac &= FRACTION_MASK;
    }
}

/// Fixed-point step for playing `src_rate` material at `dst_rate`.
///
/// The result is clamped to `1..=MAX_PITCH << FRACTION_BITS`; rates of zero
/// are rejected rather than folded into the clamp.
pub fn rate_increment(src_rate: u32, dst_rate: u32) -> Result<u32, MixerError> {
    if src_rate == 0 {
        return Err(MixerError::ZeroSourceRate);
    }
    if dst_rate == 0 {
        return Err(MixerError::ZeroOutputRate);
    }
    let step = src_rate as f64 / dst_rate as f64 * FRACTION_ONE as f64;
    Ok((step.round() as u32).clamp(1, MAX_PITCH << FRACTION_BITS))
}

/// Seeds four resampler lanes from one starting position.
///
/// Lane `k` holds the position `k` advances ahead of `(pos, frac)`, letting a
/// vector kernel produce four outputs per iteration.
pub fn spread_position(pos: usize, frac: u32, increment: u32) -> ([usize; 4], [u32; 4]) {
    debug_assert!(frac < FRACTION_ONE, "fractional phase out of range");
    let mut positions = [pos; 4];
    let mut fracs = [frac; 4];
    for lane in 1..4 {
        let stepped = fracs[lane - 1] + increment;
        positions[lane] = positions[lane - 1] + (stepped >> FRACTION_BITS) as usize;
        fracs[lane] = stepped & FRACTION_MASK;
    }
    (positions, fracs)
}
