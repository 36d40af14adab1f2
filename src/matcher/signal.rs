//! Signal-shape matcher: a coarse plosive + vowel heuristic over a short
//! window of analyser frames.
//!
//! A local maximum in waveform deviation above the burst floor models the
//! consonant burst. After it, vowel-band energy must rise to a single peak
//! inside the target band and fall again, with the peak close enough to the
//! burst to belong to the same syllable. This is not phoneme recognition.

use std::time::Duration;

use tracing::debug;

use super::{MatchOutcome, PatternMatcher};
use crate::audio::features::{self, FeatureSample};
use crate::audio::sound_buffer::SoundBuffer;
use crate::config::SignalThresholds;
use crate::source::UtteranceUnit;

/// Where in the window a burst + vowel was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub burst_index: usize,
    pub vowel_index: usize,
    pub vowel_peak: f32,
    pub gap: Duration,
}

/// Local maxima of `peak_deviation` strictly above `floor`, oldest first.
pub fn burst_candidates(samples: &[FeatureSample], floor: f32) -> impl Iterator<Item = usize> + '_ {
    (0..samples.len()).filter(move |&i| {
        let p = samples[i].peak_deviation;
        p > floor
            && (i == 0 || p >= samples[i - 1].peak_deviation)
            && (i + 1 == samples.len() || p >= samples[i + 1].peak_deviation)
    })
}

/// Run the burst → rise → fall check over chronologically ordered samples.
/// Every burst candidate is tried, so an earlier noise spike cannot hide a
/// later syllable.
pub fn detect(samples: &[FeatureSample], t: &SignalThresholds) -> Option<Detection> {
    burst_candidates(samples, t.burst_floor).find_map(|burst| vowel_after(samples, burst, t))
}

/// Vowel rise, single peak in band and fall after the burst at `burst`.
fn vowel_after(samples: &[FeatureSample], burst: usize, t: &SignalThresholds) -> Option<Detection> {
    let tail = &samples[burst..];

    let mut peak_rel = 0;
    for (i, s) in tail.iter().enumerate() {
        if s.vowel_energy > tail[peak_rel].vowel_energy {
            peak_rel = i;
        }
    }
    // a fall has to be observed after the peak
    if peak_rel + 1 >= tail.len() {
        return None;
    }

    let rising = tail[..=peak_rel]
        .windows(2)
        .all(|w| w[1].vowel_energy >= w[0].vowel_energy);
    let falling = tail[peak_rel..]
        .windows(2)
        .all(|w| w[1].vowel_energy <= w[0].vowel_energy);
    if !rising || !falling {
        return None;
    }

    let vowel_peak = tail[peak_rel].vowel_energy;
    if !t.vowel_band().contains(&vowel_peak) {
        return None;
    }

    let gap = tail[peak_rel].at.saturating_duration_since(tail[0].at);
    if gap > t.max_burst_to_vowel() {
        return None;
    }

    Some(Detection {
        burst_index: burst,
        vowel_index: burst + peak_rel,
        vowel_peak,
        gap,
    })
}

/// Frame matcher owning the sound buffer.
pub struct SignalShapeMatcher {
    buffer: SoundBuffer,
    thresholds: SignalThresholds,
}

impl SignalShapeMatcher {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self {
            buffer: SoundBuffer::new(thresholds.buffer_capacity),
            thresholds,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl PatternMatcher for SignalShapeMatcher {
    fn evaluate(&mut self, unit: &UtteranceUnit) -> MatchOutcome {
        let UtteranceUnit::Frame(frame) = unit else {
            return MatchOutcome::Inconclusive;
        };

        let sample = features::extract(
            &frame.frequency,
            &frame.time_domain,
            self.thresholds.vowel_bins.clone(),
            self.thresholds.low_bins.clone(),
            frame.captured_at,
        );
        self.buffer.push(sample);

        if self.buffered() < self.thresholds.min_samples {
            return MatchOutcome::Inconclusive;
        }

        match detect(self.buffer.as_slice(), &self.thresholds) {
            Some(d) => {
                debug!(
                    burst_index = d.burst_index,
                    vowel_index = d.vowel_index,
                    vowel_peak = d.vowel_peak,
                    gap_ms = d.gap.as_millis() as u64,
                    "burst_vowel_detected"
                );
                MatchOutcome::Matched
            }
            None => MatchOutcome::Inconclusive,
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::AudioFrame;
    use std::time::Instant;

    const FRAME: Duration = Duration::from_millis(16);

    fn frame(peak: u8, vowel: u8, at: Instant) -> UtteranceUnit {
        let mut frequency = vec![5u8; 32];
        for b in &mut frequency[10..30] {
            *b = vowel;
        }
        UtteranceUnit::Frame(AudioFrame {
            frequency,
            time_domain: vec![128, 128 + peak, 128 - peak / 2],
            captured_at: at,
        })
    }

    /// Quiet lead-in, burst at index 2, vowel rising to 100 then falling.
    fn syllable() -> Vec<(u8, u8)> {
        vec![
            (2, 30),
            (3, 30),
            (40, 60),
            (10, 80),
            (5, 100),
            (4, 95),
            (3, 90),
            (2, 85),
            (2, 80),
        ]
    }

    fn feed(m: &mut SignalShapeMatcher, shape: &[(u8, u8)], base: Instant) -> Vec<MatchOutcome> {
        shape
            .iter()
            .enumerate()
            .map(|(i, &(p, v))| m.evaluate(&frame(p, v, base + FRAME * i as u32)))
            .collect()
    }

    #[test]
    fn test_detects_syllable() {
        let mut m = SignalShapeMatcher::new(SignalThresholds::default());
        let outcomes = feed(&mut m, &syllable(), Instant::now());
        assert_eq!(outcomes.last(), Some(&MatchOutcome::Matched));
    }

    #[test]
    fn test_never_matches_below_min_samples() {
        let mut m = SignalShapeMatcher::new(SignalThresholds::default());
        let shape = syllable();
        let outcomes = feed(&mut m, &shape[..7], Instant::now());
        assert_eq!(m.buffered(), 7);
        assert!(outcomes.iter().all(|o| *o == MatchOutcome::Inconclusive));
    }

    #[test]
    fn test_no_burst_no_match() {
        let mut m = SignalShapeMatcher::new(SignalThresholds::default());
        let quiet: Vec<(u8, u8)> = syllable().into_iter().map(|(_, v)| (10, v)).collect();
        let outcomes = feed(&mut m, &quiet, Instant::now());
        assert!(outcomes.iter().all(|o| *o == MatchOutcome::Inconclusive));
    }

    #[test]
    fn test_vowel_out_of_band() {
        let mut m = SignalShapeMatcher::new(SignalThresholds::default());
        let loud: Vec<(u8, u8)> = syllable()
            .into_iter()
            .map(|(p, v)| (p, v.saturating_add(60)))
            .collect();
        let outcomes = feed(&mut m, &loud, Instant::now());
        assert!(outcomes.iter().all(|o| *o == MatchOutcome::Inconclusive));
    }

    #[test]
    fn test_vowel_too_late() {
        let mut t = SignalThresholds::default();
        t.max_burst_to_vowel_ms = 20;
        let mut m = SignalShapeMatcher::new(t);
        let outcomes = feed(&mut m, &syllable(), Instant::now());
        assert!(outcomes.iter().all(|o| *o == MatchOutcome::Inconclusive));
    }

    #[test]
    fn test_reset_clears_buffer() {
        let mut m = SignalShapeMatcher::new(SignalThresholds::default());
        feed(&mut m, &syllable()[..5], Instant::now());
        m.reset();
        assert_eq!(m.buffered(), 0);
    }

    fn samples(shape: &[(f32, f32)]) -> Vec<FeatureSample> {
        let base = Instant::now();
        shape
            .iter()
            .enumerate()
            .map(|(i, &(p, v))| FeatureSample {
                peak_deviation: p,
                vowel_energy: v,
                low_energy: 0.0,
                at: base + FRAME * i as u32,
            })
            .collect()
    }

    #[test]
    fn test_burst_candidates_are_local_maxima() {
        let s = samples(&[(5.0, 0.0), (25.0, 0.0), (30.0, 0.0), (10.0, 0.0), (22.0, 0.0)]);
        assert_eq!(burst_candidates(&s, 20.0).collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(burst_candidates(&s, 30.0).count(), 0);
    }

    #[test]
    fn test_noise_spike_before_syllable() {
        let shape = [
            (30.0, 90.0),
            (5.0, 50.0),
            (5.0, 40.0),
            (40.0, 60.0),
            (10.0, 80.0),
            (5.0, 100.0),
            (4.0, 95.0),
            (3.0, 90.0),
            (2.0, 85.0),
        ];
        let d = detect(&samples(&shape), &SignalThresholds::default()).unwrap();
        assert_eq!(d.burst_index, 3);
        assert_eq!(d.vowel_index, 5);
        assert_eq!(d.gap, FRAME * 2);

        // same window through the matcher
        let mut m = SignalShapeMatcher::new(SignalThresholds::default());
        let bytes: Vec<(u8, u8)> = shape.iter().map(|&(p, v)| (p as u8, v as u8)).collect();
        let outcomes = feed(&mut m, &bytes, Instant::now());
        assert_eq!(outcomes.last(), Some(&MatchOutcome::Matched));
    }

    #[test]
    fn test_rise_without_fall_rejected() {
        let s = samples(&[(40.0, 60.0), (5.0, 80.0), (5.0, 100.0)]);
        assert_eq!(detect(&s, &SignalThresholds::default()), None);
    }

    #[test]
    fn test_non_monotonic_rise_rejected() {
        let s = samples(&[(40.0, 60.0), (5.0, 90.0), (5.0, 70.0), (5.0, 100.0), (5.0, 80.0)]);
        assert_eq!(detect(&s, &SignalThresholds::default()), None);
    }

    #[test]
    fn test_detection_fields() {
        let s = samples(&[(1.0, 10.0), (40.0, 60.0), (5.0, 100.0), (5.0, 90.0)]);
        let d = detect(&s, &SignalThresholds::default()).unwrap();
        assert_eq!(d.burst_index, 1);
        assert_eq!(d.vowel_index, 2);
        assert_eq!(d.vowel_peak, 100.0);
        assert_eq!(d.gap, FRAME);
    }
}
