mod bsinc;
mod kernels;
mod tables;

pub use bsinc::{resample_bsinc, BsincState};
pub use kernels::{resample_fir4, resample_fir8, resample_linear, resample_point};

use serde::{Deserialize, Serialize};

/// Interpolation quality tiers, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Quality {
    Point,
    #[default]
    Linear,
    Fir4,
    Fir8,
    Bsinc,
}

/// A ready-to-run kernel selection.
///
/// The bsinc tier carries the filter state prepared for one increment;
/// rebuild the resampler when the playback ratio changes. The other tiers
/// are stateless.
#[derive(Clone)]
pub enum Resampler {
    Point,
    Linear,
    Fir4,
    Fir8,
    Bsinc(BsincState),
}

impl Resampler {
    pub fn new(quality: Quality, increment: u32) -> Self {
        match quality {
            Quality::Point => Self::Point,
            Quality::Linear => Self::Linear,
            Quality::Fir4 => Self::Fir4,
            Quality::Fir8 => Self::Fir8,
            Quality::Bsinc => Self::Bsinc(BsincState::new(increment)),
        }
    }

    pub fn quality(&self) -> Quality {
        match self {
            Self::Point => Quality::Point,
            Self::Linear => Quality::Linear,
            Self::Fir4 => Quality::Fir4,
            Self::Fir8 => Quality::Fir8,
            Self::Bsinc(_) => Quality::Bsinc,
        }
    }

    /// History samples the caller must keep before each position.
    pub fn lead(&self) -> usize {
        match self {
            Self::Point | Self::Linear => 0,
            Self::Fir4 => 1,
            Self::Fir8 => 3,
            Self::Bsinc(state) => state.lead(),
        }
    }

    /// Look-ahead samples the caller must supply past the final position.
    pub fn lag(&self) -> usize {
        match self {
            Self::Point => 0,
            Self::Linear => 1,
            Self::Fir4 => 2,
            Self::Fir8 => 4,
            Self::Bsinc(state) => state.lag(),
        }
    }

    /// Runs the selected kernel. `increment` should be the ratio this
    /// resampler was built for; the bsinc passband is prepared from it.
    pub fn run(&self, src: &[f32], pos: usize, frac: u32, increment: u32, dst: &mut [f32]) {
        match self {
            Self::Point => resample_point(src, pos, frac, increment, dst),
            Self::Linear => resample_linear(src, pos, frac, increment, dst),
            Self::Fir4 => resample_fir4(src, pos, frac, increment, dst),
            Self::Fir8 => resample_fir8(src, pos, frac, increment, dst),
            Self::Bsinc(state) => resample_bsinc(state, src, pos, frac, increment, dst),
        }
    }
}
