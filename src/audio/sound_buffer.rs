//! Sound buffer: fixed-capacity sliding window of feature samples.
//! Oldest sample is evicted on overflow; the slice view is oldest → newest.

use std::collections::VecDeque;

use super::features::FeatureSample;

pub struct SoundBuffer {
    samples: VecDeque<FeatureSample>,
    capacity: usize,
}

impl SoundBuffer {
    /// Pre-allocates `capacity` slots; never grows past it.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full.
    #[inline]
    pub fn push(&mut self, sample: FeatureSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in chronological order.
    pub fn as_slice(&mut self) -> &[FeatureSample] {
        self.samples.make_contiguous()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sample(i: u32, base: Instant) -> FeatureSample {
        FeatureSample {
            peak_deviation: i as f32,
            vowel_energy: 0.0,
            low_energy: 0.0,
            at: base + Duration::from_millis(16 * u64::from(i)),
        }
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let base = Instant::now();
        let mut buf = SoundBuffer::new(15);
        for i in 0..40 {
            buf.push(sample(i, base));
            assert!(buf.len() <= 15);
        }
        assert_eq!(buf.len(), 15);
    }

    #[test]
    fn test_sixteenth_push_evicts_oldest() {
        let base = Instant::now();
        let mut buf = SoundBuffer::new(15);
        for i in 0..15 {
            buf.push(sample(i, base));
        }
        assert_eq!(buf.as_slice()[0].peak_deviation, 0.0);

        buf.push(sample(15, base));
        let order: Vec<f32> = buf.as_slice().iter().map(|s| s.peak_deviation).collect();
        assert_eq!(order.first(), Some(&1.0));
        assert_eq!(order.last(), Some(&15.0));
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_contiguous_view_after_wrap() {
        let base = Instant::now();
        let mut buf = SoundBuffer::new(3);
        for i in 0..5 {
            buf.push(sample(i, base));
        }
        let view: Vec<f32> = buf.as_slice().iter().map(|s| s.peak_deviation).collect();
        assert_eq!(view, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_clear() {
        let mut buf = SoundBuffer::new(4);
        buf.push(sample(0, Instant::now()));
        buf.clear();
        assert!(buf.is_empty());
        buf.push(sample(1, Instant::now()));
        assert_eq!(buf.len(), 1);
    }
}
