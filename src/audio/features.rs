//! Per-frame feature extraction on AnalyserNode-style byte data.
//! Time-domain bytes are centred on 128; frequency bytes are 0-255 scaled dB.

use std::ops::Range;
use std::time::Instant;

/// Mid-scale value of a silent time-domain byte sample.
pub const TIME_DOMAIN_BASELINE: u8 = 128;

/// Features derived from one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSample {
    /// Largest |sample - 128| in the waveform.
    pub peak_deviation: f32,
    /// Mean of the vowel frequency band.
    pub vowel_energy: f32,
    /// Mean of the low frequency band.
    pub low_energy: f32,
    pub at: Instant,
}

/// Max absolute deviation of time-domain samples from the 128 baseline.
#[inline]
pub fn peak_deviation(time_domain: &[u8]) -> f32 {
    time_domain
        .iter()
        .map(|&s| (i16::from(s) - i16::from(TIME_DOMAIN_BASELINE)).unsigned_abs())
        .max()
        .map_or(0.0, f32::from)
}

/// Mean of `bins` within `frequency`. Bins past the end are ignored; an empty
/// overlap yields 0.
#[inline]
pub fn band_energy(frequency: &[u8], bins: Range<usize>) -> f32 {
    let end = bins.end.min(frequency.len());
    let start = bins.start.min(end);
    let band = &frequency[start..end];
    if band.is_empty() {
        return 0.0;
    }
    let sum: u32 = band.iter().map(|&b| u32::from(b)).sum();
    sum as f32 / band.len() as f32
}

/// Extract one feature sample from a frame pair.
pub fn extract(
    frequency: &[u8],
    time_domain: &[u8],
    vowel_bins: Range<usize>,
    low_bins: Range<usize>,
    at: Instant,
) -> FeatureSample {
    FeatureSample {
        peak_deviation: peak_deviation(time_domain),
        vowel_energy: band_energy(frequency, vowel_bins),
        low_energy: band_energy(frequency, low_bins),
        at,
    }
}
